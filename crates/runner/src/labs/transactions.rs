use labcheck_core::{Error, Output, Result, UpdateOptions, Value};
use labcheck_store::DocumentStore;
use serde_json::json;

use super::{doc, LAB_TRANSACTIONS};
use crate::step::TestStep;

fn espresso_stock(store: &dyn DocumentStore) -> Result<Value> {
    store
        .find_one("products", &doc(json!({"_id": "prod-006"}))?)?
        .and_then(|mut product| product.remove("stock"))
        .ok_or_else(|| Error::InvalidQuery("prod-006 has no stock".to_string()))
}

pub(super) fn steps() -> Vec<TestStep> {
    vec![
        TestStep::new(
            LAB_TRANSACTIONS,
            "txn-01",
            "Move stock into a new order atomically",
            r#"session.withTransaction(() => { products.updateOne({ _id: "prod-006" }, { $inc: { stock: -2 } }); orders.insertOne({ _id: "ord-2001", customer_id: "cust-002", items: [{ product_id: "prod-006", qty: 2 }] }) })"#,
            |store| {
                store.with_transaction(&mut |tx: &dyn DocumentStore| {
                    tx.update_one(
                        "products",
                        &doc(json!({"_id": "prod-006"}))?,
                        &doc(json!({"$inc": {"stock": -2}}))?,
                        UpdateOptions::default(),
                    )?;
                    let ack = tx.insert_one(
                        "orders",
                        doc(json!({
                            "_id": "ord-2001",
                            "customer_id": "cust-002",
                            "store_id": "store-002",
                            "order_date": "2024-04-10T12:00:00Z",
                            "status": "pending",
                            "items": [{"product_id": "prod-006", "qty": 2, "price": 14.5}],
                            "total": 29
                        }))?,
                    )?;
                    Ok(Output::WriteAck(ack))
                })
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_TRANSACTIONS,
            "txn-02",
            "The committed order is visible",
            r#"db.orders.findOne({ _id: "ord-2001" })"#,
            |store| Ok(Output::Document(store.find_one("orders", &doc(json!({"_id": "ord-2001"}))?)?)),
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_TRANSACTIONS,
            "txn-03",
            "A failing transaction leaves stock untouched",
            r#"session.withTransaction(() => { products.updateOne({ _id: "prod-006" }, { $inc: { stock: -5 } }); orders.insertOne({ _id: "ord-1001" }) })"#,
            |store| {
                let before = espresso_stock(store)?;
                let outcome = store.with_transaction(&mut |tx: &dyn DocumentStore| {
                    tx.update_one(
                        "products",
                        &doc(json!({"_id": "prod-006"}))?,
                        &doc(json!({"$inc": {"stock": -5}}))?,
                        UpdateOptions::default(),
                    )?;
                    // Duplicate key aborts the transaction
                    let ack = tx.insert_one("orders", doc(json!({"_id": "ord-1001"}))?)?;
                    Ok(Output::WriteAck(ack))
                });
                let after = espresso_stock(store)?;
                Ok(Output::Bool(outcome.is_err() && before == after))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_TRANSACTIONS,
            "txn-04",
            "Remove the transaction order",
            r#"db.orders.deleteOne({ _id: "ord-2001" })"#,
            |store| Ok(Output::WriteAck(store.delete_one("orders", &doc(json!({"_id": "ord-2001"}))?)?)),
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_TRANSACTIONS,
            "txn-05",
            "Put the moved stock back",
            r#"db.products.updateOne({ _id: "prod-006" }, { $inc: { stock: 2 } })"#,
            |store| {
                let ack = store.update_one(
                    "products",
                    &doc(json!({"_id": "prod-006"}))?,
                    &doc(json!({"$inc": {"stock": 2}}))?,
                    UpdateOptions::default(),
                )?;
                Ok(Output::WriteAck(ack))
            },
        )
        .expect_at_least(1),
    ]
}
