use super::{Claim, ClaimMap};

/// Ordered set of claims, unique by name
///
/// Every operation returns a new collection; an existing collection never changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimCollection {
    claims: Vec<Claim>,
}

impl ClaimCollection {
    /// Build from an ordered sequence. A repeated name replaces the earlier claim in place.
    pub fn make(claims: impl IntoIterator<Item = Claim>) -> Self {
        let mut collection = Self::default();
        for claim in claims {
            collection.upsert(claim);
        }
        collection
    }

    fn upsert(&mut self, claim: Claim) {
        match self.claims.iter_mut().find(|c| c.name() == claim.name()) {
            Some(existing) => *existing = claim,
            None => self.claims.push(claim),
        }
    }

    /// New collection with `claim` added, overriding any claim of the same name
    pub fn with(&self, claim: Claim) -> Self {
        let mut collection = self.clone();
        collection.upsert(claim);
        collection
    }

    /// New collection where claims from `other` override same-named claims here
    pub fn merge(&self, other: &ClaimCollection) -> Self {
        let mut collection = self.clone();
        for claim in &other.claims {
            collection.upsert(claim.clone());
        }
        collection
    }

    /// New collection without the named claims
    pub fn without(&self, names: &[&str]) -> Self {
        Self {
            claims: self
                .claims
                .iter()
                .filter(|c| !names.contains(&c.name()))
                .cloned()
                .collect(),
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.name() == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.get_by_name(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.claims.iter().map(Claim::name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Claim> {
        self.claims.iter()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Name → value projection handed to the driver
    pub fn to_payload_array(&self) -> ClaimMap {
        self.claims
            .iter()
            .map(|c| (c.name().to_string(), c.value().clone()))
            .collect()
    }
}

impl FromIterator<Claim> for ClaimCollection {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        Self::make(iter)
    }
}

impl<'a> IntoIterator for &'a ClaimCollection {
    type Item = &'a Claim;
    type IntoIter = std::slice::Iter<'a, Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.claims.iter()
    }
}

impl IntoIterator for ClaimCollection {
    type Item = Claim;
    type IntoIter = std::vec::IntoIter<Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.claims.into_iter()
    }
}
