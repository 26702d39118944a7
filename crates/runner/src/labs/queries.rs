use labcheck_core::{FindOptions, Output};
use serde_json::json;

use super::{doc, LAB_QUERIES};
use crate::step::TestStep;

pub(super) fn steps() -> Vec<TestStep> {
    vec![
        TestStep::new(
            LAB_QUERIES,
            "query-01",
            "Range query on price",
            "db.products.find({ price: { $gt: 50, $lte: 150 } })",
            |store| {
                let filter = doc(json!({"price": {"$gt": 50, "$lte": 150}}))?;
                Ok(Output::Cursor(store.find("products", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(4),
        TestStep::new(
            LAB_QUERIES,
            "query-02",
            "Orders still in flight",
            r#"db.orders.find({ status: { $in: ["shipped", "pending"] } })"#,
            |store| {
                let filter = doc(json!({"status": {"$in": ["shipped", "pending"]}}))?;
                Ok(Output::Cursor(store.find("orders", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(3),
        TestStep::new(
            LAB_QUERIES,
            "query-03",
            "Out of stock or premium products",
            "db.products.find({ $or: [{ stock: 0 }, { price: { $gte: 400 } }] })",
            |store| {
                let filter = doc(json!({"$or": [{"stock": 0}, {"price": {"$gte": 400}}]}))?;
                Ok(Output::Cursor(store.find("products", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(2),
        TestStep::new(
            LAB_QUERIES,
            "query-04",
            "Match on an embedded field",
            r#"db.customers.find({ "address.city": "Austin" })"#,
            |store| {
                let filter = doc(json!({"address.city": "Austin"}))?;
                Ok(Output::Cursor(store.find("customers", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(2),
        TestStep::new(
            LAB_QUERIES,
            "query-05",
            "Match an array element",
            r#"db.products.find({ tags: "coffee" })"#,
            |store| {
                let filter = doc(json!({"tags": "coffee"}))?;
                Ok(Output::Cursor(store.find("products", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(2),
        TestStep::new(
            LAB_QUERIES,
            "query-06",
            "Require every listed tag",
            r#"db.products.find({ tags: { $all: ["audio", "wireless"] } })"#,
            |store| {
                let filter = doc(json!({"tags": {"$all": ["audio", "wireless"]}}))?;
                Ok(Output::Cursor(store.find("products", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_QUERIES,
            "query-07",
            "Orders with two or more espresso bags",
            r#"db.orders.find({ items: { $elemMatch: { product_id: "prod-006", qty: { $gte: 2 } } } })"#,
            |store| {
                let filter = doc(json!({"items": {"$elemMatch": {"product_id": "prod-006", "qty": {"$gte": 2}}}}))?;
                Ok(Output::Cursor(store.find("orders", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_QUERIES,
            "query-08",
            "Policies that insure a vehicle",
            "db.policies.find({ vehicle: { $exists: true } })",
            |store| {
                let filter = doc(json!({"vehicle": {"$exists": true}}))?;
                Ok(Output::Cursor(store.find("policies", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(2),
        TestStep::new(
            LAB_QUERIES,
            "query-09",
            "Customers whose name starts with A to C",
            r#"db.customers.find({ name: { $regex: "^[A-C]" } })"#,
            |store| {
                let filter = doc(json!({"name": {"$regex": "^[A-C]"}}))?;
                Ok(Output::Cursor(store.find("customers", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(3),
        TestStep::new(
            LAB_QUERIES,
            "query-10",
            "Three most expensive products, name and price only",
            "db.products.find({}, { name: 1, price: 1, _id: 0 }).sort({ price: -1 }).limit(3)",
            |store| {
                let options = FindOptions::new()
                    .projection(doc(json!({"name": 1, "price": 1, "_id": 0}))?)
                    .sort(doc(json!({"price": -1}))?)
                    .limit(3);
                Ok(Output::Cursor(store.find("products", &doc(json!({}))?, options)?))
            },
        )
        .expect_at_least(3),
        TestStep::new(
            LAB_QUERIES,
            "query-11",
            "Distinct order statuses",
            r#"db.orders.distinct("status")"#,
            |store| Ok(Output::Values(store.distinct("orders", "status", &doc(json!({}))?)?)),
        )
        .expect_at_least(4),
        TestStep::new(
            LAB_QUERIES,
            "query-12",
            "Stores offering no services",
            "db.stores.find({ services: { $size: 0 } })",
            |store| {
                let filter = doc(json!({"services": {"$size": 0}}))?;
                Ok(Output::Cursor(store.find("stores", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(1),
    ]
}
