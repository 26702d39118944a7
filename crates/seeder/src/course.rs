//! Built-in course dataset
//!
//! Two groups of collections back the labs: the retail set (`stores`,
//! `products`, `customers`, `orders`) used by labs 1 to 7, and the insurance
//! set (`policies`, `claims`) used by the insurance lab. Every document
//! carries an explicit `_id` so lab steps can address it and reseeding
//! reproduces the same data.

use labcheck_core::{Document, IndexKind, IndexSpec, Value};
use once_cell::sync::Lazy;
use serde_json::json;

use crate::dataset::{CollectionSeed, Dataset};

static RETAIL: Lazy<Dataset> = Lazy::new(|| Dataset {
    collections: vec![stores(), products(), customers(), orders()],
});

static INSURANCE: Lazy<Dataset> = Lazy::new(|| Dataset {
    collections: vec![policies(), claims()],
});

static COURSE: Lazy<Dataset> = Lazy::new(|| Dataset {
    collections: RETAIL
        .collections
        .iter()
        .chain(&INSURANCE.collections)
        .cloned()
        .collect(),
});

/// Retail collections: stores, products, customers, orders.
pub fn retail() -> &'static Dataset {
    &RETAIL
}

/// Insurance collections: policies, claims.
pub fn insurance() -> &'static Dataset {
    &INSURANCE
}

/// Every collection the labs use.
pub fn course() -> &'static Dataset {
    &COURSE
}

fn documents(value: Value) -> Vec<Document> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn compound(value: Value) -> IndexSpec {
    match value {
        Value::Object(keys) => IndexSpec::new(keys),
        _ => IndexSpec::new(Document::new()),
    }
}

fn stores() -> CollectionSeed {
    CollectionSeed::new(
        "stores",
        documents(json!([
            {
                "_id": "store-001",
                "name": "Austin Downtown",
                "address": {"city": "Austin", "state": "TX", "zip": "78701"},
                "location": {"type": "Point", "coordinates": [-97.7431, 30.2672]},
                "opened": 2015,
                "square_feet": 12000,
                "services": ["pickup", "pharmacy"],
                "rating": 4.6
            },
            {
                "_id": "store-002",
                "name": "Dallas Uptown",
                "address": {"city": "Dallas", "state": "TX", "zip": "75201"},
                "location": {"type": "Point", "coordinates": [-96.7970, 32.7767]},
                "opened": 2017,
                "square_feet": 15000,
                "services": ["pickup"],
                "rating": 4.2
            },
            {
                "_id": "store-003",
                "name": "Houston Galleria",
                "address": {"city": "Houston", "state": "TX", "zip": "77056"},
                "location": {"type": "Point", "coordinates": [-95.4613, 29.7390]},
                "opened": 2012,
                "square_feet": 18000,
                "services": ["pickup", "pharmacy", "optical"],
                "rating": 4.4
            },
            {
                "_id": "store-004",
                "name": "San Antonio Riverwalk",
                "address": {"city": "San Antonio", "state": "TX", "zip": "78205"},
                "location": {"type": "Point", "coordinates": [-98.4895, 29.4260]},
                "opened": 2019,
                "square_feet": 9000,
                "services": ["pharmacy"],
                "rating": 4.8
            },
            {
                "_id": "store-005",
                "name": "Round Rock Outlet",
                "address": {"city": "Round Rock", "state": "TX", "zip": "78664"},
                "location": {"type": "Point", "coordinates": [-97.6789, 30.5083]},
                "opened": 2021,
                "square_feet": 7000,
                "services": [],
                "rating": 3.9
            }
        ])),
    )
    .with_index(IndexSpec::single("location", IndexKind::Geo2dSphere))
}

fn products() -> CollectionSeed {
    CollectionSeed::new(
        "products",
        documents(json!([
            {
                "_id": "prod-001",
                "sku": "EL-1001",
                "name": "Wireless Headphones",
                "category": "Electronics",
                "price": 149.99,
                "stock": 45,
                "tags": ["audio", "wireless"],
                "description": "Noise cancelling wireless headphones with 30 hour battery",
                "rating": 4.5
            },
            {
                "_id": "prod-002",
                "sku": "EL-1002",
                "name": "Bluetooth Speaker",
                "category": "Electronics",
                "price": 79.99,
                "stock": 60,
                "tags": ["audio", "portable"],
                "description": "Portable waterproof speaker with deep bass",
                "rating": 4.1
            },
            {
                "_id": "prod-003",
                "sku": "OF-2001",
                "name": "Laptop Stand",
                "category": "Office",
                "price": 39.5,
                "stock": 120,
                "tags": ["ergonomic"],
                "description": "Adjustable aluminum stand for laptops",
                "rating": 4.3
            },
            {
                "_id": "prod-004",
                "sku": "EL-1003",
                "name": "Mechanical Keyboard",
                "category": "Electronics",
                "price": 119,
                "stock": 0,
                "tags": ["keyboard", "gaming"],
                "description": "Tactile mechanical keyboard with backlit keys",
                "rating": 4.7
            },
            {
                "_id": "prod-005",
                "sku": "KI-3001",
                "name": "Coffee Maker",
                "category": "Kitchen",
                "price": 89.95,
                "stock": 25,
                "tags": ["coffee", "appliance"],
                "description": "Programmable drip coffee maker with thermal carafe",
                "rating": 4.0
            },
            {
                "_id": "prod-006",
                "sku": "GR-4001",
                "name": "Espresso Beans",
                "category": "Grocery",
                "price": 14.5,
                "stock": 200,
                "tags": ["coffee", "organic"],
                "description": "Dark roast organic espresso beans",
                "rating": 4.6
            },
            {
                "_id": "prod-007",
                "sku": "OF-2002",
                "name": "Standing Desk",
                "category": "Office",
                "price": 499,
                "stock": 8,
                "tags": ["ergonomic", "furniture"],
                "description": "Electric standing desk with memory presets",
                "rating": 4.4
            },
            {
                "_id": "prod-008",
                "sku": "OU-5001",
                "name": "Water Bottle",
                "category": "Outdoors",
                "price": 24.99,
                "stock": 150,
                "tags": ["portable", "hydration"],
                "description": "Insulated stainless steel water bottle",
                "rating": 4.2
            }
        ])),
    )
    .with_index(IndexSpec::single("sku", IndexKind::Ascending).unique())
    .with_index(IndexSpec::single("category", IndexKind::Ascending))
    .with_index(compound(json!({"name": "text", "description": "text"})).named("product_text"))
}

fn customers() -> CollectionSeed {
    CollectionSeed::new(
        "customers",
        documents(json!([
            {
                "_id": "cust-001",
                "name": "Alice Johnson",
                "email": "alice@example.com",
                "tier": "gold",
                "address": {"city": "Austin", "state": "TX"},
                "loyalty_points": 1200,
                "joined": "2021-03-14"
            },
            {
                "_id": "cust-002",
                "name": "Bob Smith",
                "email": "bob@example.com",
                "tier": "silver",
                "address": {"city": "Dallas", "state": "TX"},
                "loyalty_points": 450,
                "joined": "2022-07-01"
            },
            {
                "_id": "cust-003",
                "name": "Carla Gomez",
                "email": "carla@example.com",
                "tier": "gold",
                "address": {"city": "Houston", "state": "TX"},
                "loyalty_points": 2300,
                "joined": "2020-11-23"
            },
            {
                "_id": "cust-004",
                "name": "David Lee",
                "email": "david@example.com",
                "tier": "bronze",
                "address": {"city": "San Antonio", "state": "TX"},
                "loyalty_points": 80,
                "joined": "2023-09-05"
            },
            {
                "_id": "cust-005",
                "name": "Erin Park",
                "email": "erin@example.com",
                "tier": "silver",
                "address": {"city": "Austin", "state": "TX"},
                "loyalty_points": 610,
                "joined": "2022-02-17"
            }
        ])),
    )
    .with_index(IndexSpec::single("email", IndexKind::Ascending).unique())
}

fn orders() -> CollectionSeed {
    CollectionSeed::new(
        "orders",
        documents(json!([
            {
                "_id": "ord-1001",
                "customer_id": "cust-001",
                "store_id": "store-001",
                "order_date": "2024-01-05T10:15:00Z",
                "status": "delivered",
                "items": [
                    {"product_id": "prod-001", "qty": 1, "price": 149.99},
                    {"product_id": "prod-006", "qty": 2, "price": 14.5}
                ],
                "total": 178.99
            },
            {
                "_id": "ord-1002",
                "customer_id": "cust-002",
                "store_id": "store-002",
                "order_date": "2024-01-12T16:40:00Z",
                "status": "delivered",
                "items": [{"product_id": "prod-002", "qty": 1, "price": 79.99}],
                "total": 79.99
            },
            {
                "_id": "ord-1003",
                "customer_id": "cust-003",
                "store_id": "store-003",
                "order_date": "2024-02-03T09:05:00Z",
                "status": "shipped",
                "items": [
                    {"product_id": "prod-007", "qty": 1, "price": 499},
                    {"product_id": "prod-003", "qty": 1, "price": 39.5}
                ],
                "total": 538.5
            },
            {
                "_id": "ord-1004",
                "customer_id": "cust-001",
                "store_id": "store-005",
                "order_date": "2024-02-18T13:30:00Z",
                "status": "delivered",
                "items": [{"product_id": "prod-005", "qty": 1, "price": 89.95}],
                "total": 89.95
            },
            {
                "_id": "ord-1005",
                "customer_id": "cust-004",
                "store_id": "store-004",
                "order_date": "2024-03-01T11:00:00Z",
                "status": "pending",
                "items": [{"product_id": "prod-008", "qty": 3, "price": 24.99}],
                "total": 74.97
            },
            {
                "_id": "ord-1006",
                "customer_id": "cust-005",
                "store_id": "store-001",
                "order_date": "2024-03-09T18:20:00Z",
                "status": "shipped",
                "items": [
                    {"product_id": "prod-004", "qty": 1, "price": 119},
                    {"product_id": "prod-006", "qty": 1, "price": 14.5}
                ],
                "total": 133.5
            },
            {
                "_id": "ord-1007",
                "customer_id": "cust-003",
                "store_id": "store-003",
                "order_date": "2024-03-22T15:45:00Z",
                "status": "delivered",
                "items": [{"product_id": "prod-001", "qty": 2, "price": 149.99}],
                "total": 299.98
            },
            {
                "_id": "ord-1008",
                "customer_id": "cust-002",
                "store_id": "store-002",
                "order_date": "2024-04-02T08:10:00Z",
                "status": "cancelled",
                "items": [{"product_id": "prod-003", "qty": 2, "price": 39.5}],
                "total": 79
            }
        ])),
    )
    .with_index(compound(json!({"customer_id": 1, "order_date": -1})))
    .with_index(IndexSpec::single("status", IndexKind::Ascending))
}

fn policies() -> CollectionSeed {
    CollectionSeed::new(
        "policies",
        documents(json!([
            {
                "_id": "POL-1001",
                "customer_id": "cust-001",
                "policyholder": "Alice Johnson",
                "policy_type": "auto",
                "premium": 1200,
                "coverage_limit": 50000,
                "deductible": 500,
                "start_date": "2024-01-01",
                "end_date": "2024-12-31",
                "status": "active",
                "vehicle": {"make": "Toyota", "model": "Camry", "year": 2021}
            },
            {
                "_id": "POL-1002",
                "customer_id": "cust-002",
                "policyholder": "Bob Smith",
                "policy_type": "home",
                "premium": 950,
                "coverage_limit": 300000,
                "deductible": 1000,
                "start_date": "2024-02-01",
                "end_date": "2025-01-31",
                "status": "active"
            },
            {
                "_id": "POL-1003",
                "customer_id": "cust-003",
                "policyholder": "Carla Gomez",
                "policy_type": "life",
                "premium": 600,
                "coverage_limit": 500000,
                "deductible": 0,
                "start_date": "2023-06-15",
                "end_date": "2043-06-14",
                "status": "active"
            },
            {
                "_id": "POL-1004",
                "customer_id": "cust-004",
                "policyholder": "David Lee",
                "policy_type": "auto",
                "premium": 1450,
                "coverage_limit": 40000,
                "deductible": 750,
                "start_date": "2023-03-01",
                "end_date": "2024-02-29",
                "status": "lapsed",
                "vehicle": {"make": "Ford", "model": "F-150", "year": 2018}
            },
            {
                "_id": "POL-1005",
                "customer_id": "cust-005",
                "policyholder": "Erin Park",
                "policy_type": "home",
                "premium": 1100,
                "coverage_limit": 350000,
                "deductible": 1000,
                "start_date": "2024-04-01",
                "end_date": "2025-03-31",
                "status": "active"
            }
        ])),
    )
    .with_index(IndexSpec::single("policy_type", IndexKind::Ascending))
    .with_index(IndexSpec::single("status", IndexKind::Ascending))
}

fn claims() -> CollectionSeed {
    CollectionSeed::new(
        "claims",
        documents(json!([
            {
                "_id": "CLM-5001",
                "policy_id": "POL-1001",
                "claim_date": "2024-02-10",
                "amount": 3200,
                "status": "approved",
                "description": "Rear bumper damage after parking lot collision",
                "adjuster": "M. Chen",
                "incident_location": {"type": "Point", "coordinates": [-97.7500, 30.2700]}
            },
            {
                "_id": "CLM-5002",
                "policy_id": "POL-1002",
                "claim_date": "2024-03-05",
                "amount": 18500,
                "status": "open",
                "description": "Water damage from burst pipe in kitchen",
                "adjuster": "R. Patel",
                "incident_location": {"type": "Point", "coordinates": [-96.8000, 32.7800]}
            },
            {
                "_id": "CLM-5003",
                "policy_id": "POL-1001",
                "claim_date": "2024-04-21",
                "amount": 900,
                "status": "denied",
                "description": "Windshield chip from highway debris",
                "adjuster": "M. Chen",
                "incident_location": {"type": "Point", "coordinates": [-97.7000, 30.4000]}
            },
            {
                "_id": "CLM-5004",
                "policy_id": "POL-1005",
                "claim_date": "2024-05-02",
                "amount": 7400,
                "status": "approved",
                "description": "Hail damage to roof shingles",
                "adjuster": "S. Okafor",
                "incident_location": {"type": "Point", "coordinates": [-97.7200, 30.2900]}
            },
            {
                "_id": "CLM-5005",
                "policy_id": "POL-1004",
                "claim_date": "2024-05-15",
                "amount": 2600,
                "status": "open",
                "description": "Side mirror collision in parking garage",
                "adjuster": "R. Patel",
                "incident_location": {"type": "Point", "coordinates": [-98.4900, 29.4300]}
            },
            {
                "_id": "CLM-5006",
                "policy_id": "POL-1002",
                "claim_date": "2024-06-30",
                "amount": 1200,
                "status": "approved",
                "description": "Storm damage to backyard fence",
                "adjuster": "S. Okafor",
                "incident_location": {"type": "Point", "coordinates": [-96.7900, 32.7700]}
            }
        ])),
    )
    .with_index(IndexSpec::single("policy_id", IndexKind::Ascending))
    .with_index(IndexSpec::single("description", IndexKind::Text))
    .with_index(IndexSpec::single("incident_location", IndexKind::Geo2dSphere))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeder::Seeder;
    use labcheck_store::{DocumentStore, MemoryStore};

    #[test]
    fn test_course_covers_every_collection() {
        assert_eq!(
            course().collection_names(),
            vec!["stores", "products", "customers", "orders", "policies", "claims"]
        );
        assert_eq!(course().document_count(), 5 + 8 + 5 + 8 + 5 + 6);
    }

    #[test]
    fn test_every_document_has_explicit_id() {
        for seed in &course().collections {
            for doc in &seed.documents {
                assert!(doc.contains_key("_id"), "{} document without _id", seed.name);
            }
        }
    }

    #[test]
    fn test_course_seeds_cleanly() {
        let store = MemoryStore::new();
        let summary = Seeder::seed(&store, course()).unwrap();
        assert_eq!(summary.total_inserted(), 37);
        assert_eq!(
            summary.collections[1].indexes,
            vec!["sku_1", "category_1", "product_text"]
        );
        assert_eq!(store.list_indexes("claims").unwrap().len(), 4);
    }

    #[test]
    fn test_retail_and_insurance_partition_course() {
        let merged = retail().clone().merge(insurance().clone()).unwrap();
        assert_eq!(&merged, course());
    }
}
