// src/catalog/branches.rs

use crate::decode::{Cell, TypedRecord};

struct BranchSeed {
    slug: &'static str,
    name: &'static str,
    address: &'static str,
    phone: &'static str,
    maps_url: &'static str,
    whatsapp_url: &'static str,
    instagram_url: &'static str,
    is_active: bool,
}

const BRANCHES: [BranchSeed; 2] = [
    BranchSeed {
        slug: "san-joaquin",
        name: "San Joaquín",
        address: "Av. San Joaquín 1520, Local 4",
        phone: "+56 2 2345 6789",
        maps_url: "https://maps.google.com/?q=Av.+San+Joaquin+1520",
        whatsapp_url: "https://wa.me/56923456789",
        instagram_url: "https://instagram.com/sanjoaquin.local",
        is_active: true,
    },
    BranchSeed {
        slug: "la-floresta",
        name: "La Floresta",
        address: "Calle Las Acacias 233",
        phone: "+56 2 2987 6543",
        maps_url: "https://maps.google.com/?q=Calle+Las+Acacias+233",
        whatsapp_url: "https://wa.me/56929876543",
        instagram_url: "https://instagram.com/lafloresta.local",
        is_active: true,
    },
];

/// The branch rows upserted on every run, keyed by slug.
pub fn seed_rows() -> Vec<TypedRecord> {
    BRANCHES
        .iter()
        .map(|b| {
            TypedRecord::from_cells([
                ("slug", Cell::Text(b.slug.into())),
                ("name", Cell::Text(b.name.into())),
                ("address", Cell::Text(b.address.into())),
                ("phone", Cell::Text(b.phone.into())),
                ("maps_url", Cell::Text(b.maps_url.into())),
                ("whatsapp_url", Cell::Text(b.whatsapp_url.into())),
                ("instagram_url", Cell::Text(b.instagram_url.into())),
                ("is_active", Cell::Bool(b.is_active)),
            ])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tables::DEFAULT_BRANCH_SLUG;

    #[test]
    fn seed_contains_default_branch_once() {
        let rows = seed_rows();
        assert_eq!(rows.len(), 2);
        let defaults = rows
            .iter()
            .filter(|r| r.get("slug") == Some(&Cell::Text(DEFAULT_BRANCH_SLUG.into())))
            .count();
        assert_eq!(defaults, 1);
    }

    #[test]
    fn seed_rows_cover_branch_policy() {
        let table = crate::catalog::tables::find("branches").unwrap();
        for row in seed_rows() {
            for rule in table.policy {
                assert!(row.get(rule.name).is_some(), "missing {}", rule.name);
            }
        }
    }
}
