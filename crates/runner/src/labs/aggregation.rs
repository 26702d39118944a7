use labcheck_core::Output;
use serde_json::json;

use super::{pipeline, LAB_AGGREGATION};
use crate::step::TestStep;

pub(super) fn steps() -> Vec<TestStep> {
    vec![
        TestStep::new(
            LAB_AGGREGATION,
            "agg-01",
            "Revenue per store, excluding cancelled orders",
            r#"db.orders.aggregate([{ $match: { status: { $ne: "cancelled" } } }, { $group: { _id: "$store_id", revenue: { $sum: "$total" }, orders: { $sum: 1 } } }, { $sort: { revenue: -1 } }])"#,
            |store| {
                let stages = pipeline(json!([
                    {"$match": {"status": {"$ne": "cancelled"}}},
                    {"$group": {"_id": "$store_id", "revenue": {"$sum": "$total"}, "orders": {"$sum": 1}}},
                    {"$sort": {"revenue": -1}}
                ]))?;
                Ok(Output::Documents(store.aggregate("orders", &stages)?))
            },
        )
        .expect_at_least(5),
        TestStep::new(
            LAB_AGGREGATION,
            "agg-02",
            "Top three products by units sold",
            r#"db.orders.aggregate([{ $unwind: "$items" }, { $group: { _id: "$items.product_id", units: { $sum: "$items.qty" } } }, { $sort: { units: -1 } }, { $limit: 3 }])"#,
            |store| {
                let stages = pipeline(json!([
                    {"$unwind": "$items"},
                    {"$group": {"_id": "$items.product_id", "units": {"$sum": "$items.qty"}}},
                    {"$sort": {"units": -1}},
                    {"$limit": 3}
                ]))?;
                Ok(Output::Documents(store.aggregate("orders", &stages)?))
            },
        )
        .expect_at_least(3),
        TestStep::new(
            LAB_AGGREGATION,
            "agg-03",
            "Join an order to its customer",
            r#"db.orders.aggregate([{ $match: { _id: "ord-1003" } }, { $lookup: { from: "customers", localField: "customer_id", foreignField: "_id", as: "customer" } }, { $unwind: "$customer" }, { $project: { total: 1, "customer.name": 1 } }])"#,
            |store| {
                let stages = pipeline(json!([
                    {"$match": {"_id": "ord-1003"}},
                    {"$lookup": {"from": "customers", "localField": "customer_id", "foreignField": "_id", "as": "customer"}},
                    {"$unwind": "$customer"},
                    {"$project": {"total": 1, "customer.name": 1}}
                ]))?;
                Ok(Output::Documents(store.aggregate("orders", &stages)?))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_AGGREGATION,
            "agg-04",
            "Count delivered orders",
            r#"db.orders.aggregate([{ $match: { status: "delivered" } }, { $count: "delivered" }])"#,
            |store| {
                let stages = pipeline(json!([
                    {"$match": {"status": "delivered"}},
                    {"$count": "delivered"}
                ]))?;
                Ok(Output::Documents(store.aggregate("orders", &stages)?))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_AGGREGATION,
            "agg-05",
            "Inventory value per product",
            r#"db.products.aggregate([{ $project: { name: 1, inventory_value: { $multiply: ["$price", "$stock"] } } }])"#,
            |store| {
                let stages = pipeline(json!([
                    {"$project": {"name": 1, "inventory_value": {"$multiply": ["$price", "$stock"]}}}
                ]))?;
                Ok(Output::Documents(store.aggregate("products", &stages)?))
            },
        )
        .expect_at_least(8),
        TestStep::new(
            LAB_AGGREGATION,
            "agg-06",
            "Orders per month",
            r#"db.orders.aggregate([{ $group: { _id: { $month: "$order_date" }, orders: { $sum: 1 }, revenue: { $sum: "$total" } } }, { $sort: { _id: 1 } }])"#,
            |store| {
                let stages = pipeline(json!([
                    {"$group": {"_id": {"$month": "$order_date"}, "orders": {"$sum": 1}, "revenue": {"$sum": "$total"}}},
                    {"$sort": {"_id": 1}}
                ]))?;
                Ok(Output::Documents(store.aggregate("orders", &stages)?))
            },
        )
        .expect_at_least(4),
        TestStep::new(
            LAB_AGGREGATION,
            "agg-07",
            "Average price per category",
            r#"db.products.aggregate([{ $group: { _id: "$category", avg_price: { $avg: "$price" }, products: { $push: "$name" } } }, { $sort: { avg_price: -1 } }])"#,
            |store| {
                let stages = pipeline(json!([
                    {"$group": {"_id": "$category", "avg_price": {"$avg": "$price"}, "products": {"$push": "$name"}}},
                    {"$sort": {"avg_price": -1}}
                ]))?;
                Ok(Output::Documents(store.aggregate("products", &stages)?))
            },
        )
        .expect_at_least(5),
        TestStep::new(
            LAB_AGGREGATION,
            "agg-08",
            "Customers per loyalty tier",
            r#"db.customers.aggregate([{ $sortByCount: "$tier" }])"#,
            |store| {
                let stages = pipeline(json!([{"$sortByCount": "$tier"}]))?;
                Ok(Output::Documents(store.aggregate("customers", &stages)?))
            },
        )
        .expect_at_least(3),
    ]
}
