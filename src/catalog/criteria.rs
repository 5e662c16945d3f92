use crate::model::{TapeCartridge, TapeLocation, TapeLocationType, TapeState};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BucketFilter {
    #[default]
    Any,
    Equals(String),
    /// Same bucket, or a cartridge not yet assigned to any bucket
    EqualsOrUnassigned(String),
}

/// Conjunction of optional field filters over catalog entries
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogCriteria {
    pub code: Option<String>,
    pub library: Option<String>,
    pub state: Option<TapeState>,
    pub bucket: BucketFilter,
    pub location: Option<TapeLocation>,
    /// Exclude cartridges outside robotic reach
    pub reachable_only: bool,
}

impl CatalogCriteria {
    pub fn by_code(code: &str) -> Self {
        Self {
            code: Some(code.to_string()),
            ..Self::default()
        }
    }

    pub fn in_library(library: &str) -> Self {
        Self {
            library: Some(library.to_string()),
            ..Self::default()
        }
    }

    pub fn with_state(mut self, state: TapeState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_bucket(mut self, bucket: BucketFilter) -> Self {
        self.bucket = bucket;
        self
    }

    pub fn at_location(location: TapeLocation) -> Self {
        Self {
            location: Some(location),
            ..Self::default()
        }
    }

    pub fn reachable(mut self) -> Self {
        self.reachable_only = true;
        self
    }

    pub fn matches(&self, cartridge: &TapeCartridge) -> bool {
        if let Some(code) = &self.code {
            if &cartridge.code != code {
                return false;
            }
        }
        if let Some(library) = &self.library {
            if &cartridge.library != library {
                return false;
            }
        }
        if let Some(state) = self.state {
            if cartridge.state != state {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if &cartridge.current_location != location {
                return false;
            }
        }
        if self.reachable_only
            && cartridge.current_location.location_type() == TapeLocationType::Outside
        {
            return false;
        }
        match &self.bucket {
            BucketFilter::Any => true,
            BucketFilter::Equals(bucket) => cartridge.bucket.as_ref() == Some(bucket),
            BucketFilter::EqualsOrUnassigned(bucket) => match &cartridge.bucket {
                None => true,
                Some(b) => b == bucket,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TapeLocation;

    #[test]
    fn test_criteria_matching() {
        let open = TapeCartridge::new("T1", "LIB", TapeLocation::slot(1))
            .with_bucket("b1")
            .with_state(TapeState::Open);
        let fresh = TapeCartridge::new("T2", "LIB", TapeLocation::slot(2));

        assert!(CatalogCriteria::by_code("T1").matches(&open));
        assert!(!CatalogCriteria::by_code("T1").matches(&fresh));

        let writable = CatalogCriteria::in_library("LIB")
            .with_state(TapeState::Open)
            .with_bucket(BucketFilter::Equals("b1".into()));
        assert!(writable.matches(&open));
        assert!(!writable.matches(&fresh));

        let empty = CatalogCriteria::in_library("LIB")
            .with_state(TapeState::Empty)
            .with_bucket(BucketFilter::EqualsOrUnassigned("b1".into()));
        assert!(empty.matches(&fresh));
        assert!(!CatalogCriteria::in_library("OTHER").matches(&fresh));
    }

    #[test]
    fn test_location_filters() {
        let mounted = TapeCartridge::new("T1", "LIB", TapeLocation::drive(0));
        let lost = TapeCartridge::new("T2", "LIB", TapeLocation::outside());

        assert!(CatalogCriteria::at_location(TapeLocation::drive(0)).matches(&mounted));
        assert!(!CatalogCriteria::at_location(TapeLocation::drive(1)).matches(&mounted));

        let reachable = CatalogCriteria::in_library("LIB").reachable();
        assert!(reachable.matches(&mounted));
        assert!(!reachable.matches(&lost));
    }
}
