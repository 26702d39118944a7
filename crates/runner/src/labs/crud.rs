use labcheck_core::{FindOptions, Output, UpdateOptions};
use serde_json::json;

use super::{doc, LAB_CRUD};
use crate::step::TestStep;

pub(super) fn steps() -> Vec<TestStep> {
    vec![
        TestStep::new(
            LAB_CRUD,
            "crud-01",
            "Insert a single store",
            r#"db.stores.insertOne({ _id: "store-100", name: "Lab Test Store", address: { city: "El Paso", state: "TX" }, location: { type: "Point", coordinates: [-106.4850, 31.7619] } })"#,
            |store| {
                let ack = store.insert_one(
                    "stores",
                    doc(json!({
                        "_id": "store-100",
                        "name": "Lab Test Store",
                        "address": {"city": "El Paso", "state": "TX"},
                        "location": {"type": "Point", "coordinates": [-106.4850, 31.7619]}
                    }))?,
                )?;
                Ok(Output::WriteAck(ack))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_CRUD,
            "crud-02",
            "Insert several products at once",
            r#"db.products.insertMany([{ _id: "prod-100", sku: "LB-1", name: "Lab Mug", category: "Kitchen", price: 9.99, stock: 10 }, { _id: "prod-101", sku: "LB-2", name: "Lab Notebook", category: "Office", price: 4.5, stock: 30 }])"#,
            |store| {
                let ack = store.insert_many(
                    "products",
                    vec![
                        doc(json!({"_id": "prod-100", "sku": "LB-1", "name": "Lab Mug", "category": "Kitchen", "price": 9.99, "stock": 10}))?,
                        doc(json!({"_id": "prod-101", "sku": "LB-2", "name": "Lab Notebook", "category": "Office", "price": 4.5, "stock": 30}))?,
                    ],
                )?;
                Ok(Output::WriteAck(ack))
            },
        )
        .expect_at_least(2),
        TestStep::new(
            LAB_CRUD,
            "crud-03",
            "Read the inserted store back",
            r#"db.stores.findOne({ _id: "store-100" })"#,
            |store| Ok(Output::Document(store.find_one("stores", &doc(json!({"_id": "store-100"}))?)?)),
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_CRUD,
            "crud-04",
            "Find products in a category",
            r#"db.products.find({ category: "Electronics" })"#,
            |store| {
                let cursor = store.find("products", &doc(json!({"category": "Electronics"}))?, FindOptions::default())?;
                Ok(Output::Cursor(cursor))
            },
        )
        .expect_at_least(3),
        TestStep::new(
            LAB_CRUD,
            "crud-05",
            "Update one store with $set and $push",
            r#"db.stores.updateOne({ _id: "store-100" }, { $set: { rating: 4.0 }, $push: { services: "pickup" } })"#,
            |store| {
                let ack = store.update_one(
                    "stores",
                    &doc(json!({"_id": "store-100"}))?,
                    &doc(json!({"$set": {"rating": 4.0}, "$push": {"services": "pickup"}}))?,
                    UpdateOptions::default(),
                )?;
                Ok(Output::WriteAck(ack))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_CRUD,
            "crud-06",
            "Update every lab product",
            r#"db.products.updateMany({ sku: { $regex: "^LB-" } }, { $set: { on_sale: true } })"#,
            |store| {
                let ack = store.update_many(
                    "products",
                    &doc(json!({"sku": {"$regex": "^LB-"}}))?,
                    &doc(json!({"$set": {"on_sale": true}}))?,
                    UpdateOptions::default(),
                )?;
                Ok(Output::WriteAck(ack))
            },
        )
        .expect_at_least(2),
        TestStep::new(
            LAB_CRUD,
            "crud-07",
            "Upsert a customer that does not exist yet",
            r#"db.customers.updateOne({ email: "lab@example.com" }, { $set: { name: "Lab Student", tier: "bronze" } }, { upsert: true })"#,
            |store| {
                let ack = store.update_one(
                    "customers",
                    &doc(json!({"email": "lab@example.com"}))?,
                    &doc(json!({"$set": {"name": "Lab Student", "tier": "bronze"}}))?,
                    UpdateOptions::upsert(),
                )?;
                Ok(Output::WriteAck(ack))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_CRUD,
            "crud-08",
            "Delete the inserted store",
            r#"db.stores.deleteOne({ _id: "store-100" })"#,
            |store| Ok(Output::WriteAck(store.delete_one("stores", &doc(json!({"_id": "store-100"}))?)?)),
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_CRUD,
            "crud-09",
            "Delete the lab products",
            r#"db.products.deleteMany({ sku: { $in: ["LB-1", "LB-2"] } })"#,
            |store| {
                let ack = store.delete_many("products", &doc(json!({"sku": {"$in": ["LB-1", "LB-2"]}}))?)?;
                Ok(Output::WriteAck(ack))
            },
        )
        .expect_at_least(2),
        TestStep::new(
            LAB_CRUD,
            "crud-10",
            "Delete the upserted customer",
            r#"db.customers.deleteOne({ email: "lab@example.com" })"#,
            |store| {
                let ack = store.delete_one("customers", &doc(json!({"email": "lab@example.com"}))?)?;
                Ok(Output::WriteAck(ack))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_CRUD,
            "crud-11",
            "Count stores after cleanup",
            "db.stores.countDocuments({})",
            |store| Ok(Output::Count(store.count_documents("stores", &doc(json!({}))?)?)),
        )
        .expect_at_least(5),
    ]
}
