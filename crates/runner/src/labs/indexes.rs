use labcheck_core::{FindOptions, IndexKind, IndexSpec, Output};
use serde_json::json;

use super::{doc, LAB_INDEXES};
use crate::step::TestStep;

pub(super) fn steps() -> Vec<TestStep> {
    vec![
        TestStep::new(
            LAB_INDEXES,
            "index-01",
            "Single-field index on orders",
            "db.orders.createIndex({ store_id: 1 })",
            |store| {
                let name = store.create_index("orders", IndexSpec::single("store_id", IndexKind::Ascending))?;
                Ok(Output::Name(name))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_INDEXES,
            "index-02",
            "Compound index for category listings",
            "db.products.createIndex({ category: 1, price: -1 })",
            |store| {
                let name = store.create_index("products", IndexSpec::new(doc(json!({"category": 1, "price": -1}))?))?;
                Ok(Output::Name(name))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_INDEXES,
            "index-03",
            "Unique index on customer names",
            "db.customers.createIndex({ name: 1 }, { unique: true })",
            |store| {
                let name = store.create_index("customers", IndexSpec::single("name", IndexKind::Ascending).unique())?;
                Ok(Output::Name(name))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_INDEXES,
            "index-04",
            "List the order indexes",
            "db.orders.getIndexes()",
            |store| Ok(Output::Documents(store.list_indexes("orders")?)),
        )
        .expect_at_least(4),
        TestStep::new(
            LAB_INDEXES,
            "index-05",
            "Drop the single-field order index",
            r#"db.orders.dropIndex("store_id_1")"#,
            |store| {
                store.drop_index("orders", "store_id_1")?;
                Ok(Output::Unit)
            },
        ),
        TestStep::new(
            LAB_INDEXES,
            "index-06",
            "Query served by the compound order index",
            r#"db.orders.find({ customer_id: "cust-001" }).sort({ order_date: -1 })"#,
            |store| {
                let options = FindOptions::new().sort(doc(json!({"order_date": -1}))?);
                let filter = doc(json!({"customer_id": "cust-001"}))?;
                Ok(Output::Cursor(store.find("orders", &filter, options)?))
            },
        )
        .expect_at_least(2),
        TestStep::new(
            LAB_INDEXES,
            "index-07",
            "List the product indexes",
            "db.products.getIndexes()",
            |store| Ok(Output::Documents(store.list_indexes("products")?)),
        )
        .expect_at_least(4),
    ]
}
