//! Lenses: which backend, adapter and field mapping serve a request

mod loader;
mod registry;

pub use loader::LensLoader;
pub use registry::{LensEntry, LensRegistry, LensSuggestions};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend identity of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lens {
    Catalog,
    Articles,
    Inventory,
}

impl Lens {
    pub fn all() -> [Lens; 3] {
        [Lens::Catalog, Lens::Articles, Lens::Inventory]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Lens::Catalog => "catalog",
            Lens::Articles => "articles",
            Lens::Inventory => "inventory",
        }
    }
}

impl fmt::Display for Lens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lens {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "catalog" => Ok(Lens::Catalog),
            "articles" => Ok(Lens::Articles),
            "inventory" => Ok(Lens::Inventory),
            _ => Err(anyhow::anyhow!("Unknown lens: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lens() {
        assert_eq!("catalog".parse::<Lens>().unwrap(), Lens::Catalog);
        assert_eq!("Articles".parse::<Lens>().unwrap(), Lens::Articles);
        assert!("journals".parse::<Lens>().is_err());

        for lens in Lens::all() {
            assert_eq!(lens.as_str().parse::<Lens>().unwrap(), lens);
        }
    }
}
