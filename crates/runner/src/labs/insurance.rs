use labcheck_core::{FindOptions, Output, UpdateOptions};
use serde_json::json;

use super::{doc, pipeline, LAB_INSURANCE};
use crate::step::TestStep;

pub(super) fn steps() -> Vec<TestStep> {
    vec![
        TestStep::new(
            LAB_INSURANCE,
            "ins-01",
            "Active auto policies",
            r#"db.policies.find({ policy_type: "auto", status: "active" })"#,
            |store| {
                let filter = doc(json!({"policy_type": "auto", "status": "active"}))?;
                Ok(Output::Cursor(store.find("policies", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_INSURANCE,
            "ins-02",
            "Open claims above 2000",
            r#"db.claims.find({ status: "open", amount: { $gt: 2000 } }).sort({ amount: -1 })"#,
            |store| {
                let filter = doc(json!({"status": "open", "amount": {"$gt": 2000}}))?;
                let options = FindOptions::new().sort(doc(json!({"amount": -1}))?);
                Ok(Output::Cursor(store.find("claims", &filter, options)?))
            },
        )
        .expect_at_least(2),
        TestStep::new(
            LAB_INSURANCE,
            "ins-03",
            "Claim totals per policy",
            r#"db.claims.aggregate([{ $group: { _id: "$policy_id", claims: { $sum: 1 }, claimed: { $sum: "$amount" } } }, { $sort: { claimed: -1 } }])"#,
            |store| {
                let stages = pipeline(json!([
                    {"$group": {"_id": "$policy_id", "claims": {"$sum": 1}, "claimed": {"$sum": "$amount"}}},
                    {"$sort": {"claimed": -1}}
                ]))?;
                Ok(Output::Documents(store.aggregate("claims", &stages)?))
            },
        )
        .expect_at_least(4),
        TestStep::new(
            LAB_INSURANCE,
            "ins-04",
            "Approved claims with their policyholder",
            r#"db.claims.aggregate([{ $match: { status: "approved" } }, { $lookup: { from: "policies", localField: "policy_id", foreignField: "_id", as: "policy" } }, { $unwind: "$policy" }, { $project: { amount: 1, "policy.policyholder": 1, "policy.policy_type": 1 } }])"#,
            |store| {
                let stages = pipeline(json!([
                    {"$match": {"status": "approved"}},
                    {"$lookup": {"from": "policies", "localField": "policy_id", "foreignField": "_id", "as": "policy"}},
                    {"$unwind": "$policy"},
                    {"$project": {"amount": 1, "policy.policyholder": 1, "policy.policy_type": 1}}
                ]))?;
                Ok(Output::Documents(store.aggregate("claims", &stages)?))
            },
        )
        .expect_at_least(3),
        TestStep::new(
            LAB_INSURANCE,
            "ins-05",
            "Claims describing a collision",
            r#"db.claims.find({ $text: { $search: "collision" } })"#,
            |store| {
                let filter = doc(json!({"$text": {"$search": "collision"}}))?;
                Ok(Output::Cursor(store.find("claims", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(2),
        TestStep::new(
            LAB_INSURANCE,
            "ins-06",
            "Incidents within 20 km of Austin",
            r#"db.claims.find({ incident_location: { $near: { $geometry: { type: "Point", coordinates: [-97.7431, 30.2672] }, $maxDistance: 20000 } } })"#,
            |store| {
                let filter = doc(json!({"incident_location": {"$near": {
                    "$geometry": {"type": "Point", "coordinates": [-97.7431, 30.2672]},
                    "$maxDistance": 20000
                }}}))?;
                Ok(Output::Cursor(store.find("claims", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(3),
        TestStep::new(
            LAB_INSURANCE,
            "ins-07",
            "Mark a claim as reviewed",
            r#"db.claims.updateOne({ _id: "CLM-5002" }, { $set: { reviewed: true }, $currentDate: { last_reviewed: true } })"#,
            |store| {
                let ack = store.update_one(
                    "claims",
                    &doc(json!({"_id": "CLM-5002"}))?,
                    &doc(json!({"$set": {"reviewed": true}, "$currentDate": {"last_reviewed": true}}))?,
                    UpdateOptions::default(),
                )?;
                Ok(Output::WriteAck(ack))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_INSURANCE,
            "ins-08",
            "Premium and coverage by policy type",
            r#"db.policies.aggregate([{ $group: { _id: "$policy_type", policies: { $sum: 1 }, avg_premium: { $avg: "$premium" }, total_coverage: { $sum: "$coverage_limit" } } }])"#,
            |store| {
                let stages = pipeline(json!([
                    {"$group": {
                        "_id": "$policy_type",
                        "policies": {"$sum": 1},
                        "avg_premium": {"$avg": "$premium"},
                        "total_coverage": {"$sum": "$coverage_limit"}
                    }}
                ]))?;
                Ok(Output::Documents(store.aggregate("policies", &stages)?))
            },
        )
        .expect_at_least(3),
        TestStep::new(
            LAB_INSURANCE,
            "ins-09",
            "Count lapsed policies",
            r#"db.policies.countDocuments({ status: "lapsed" })"#,
            |store| Ok(Output::Count(store.count_documents("policies", &doc(json!({"status": "lapsed"}))?)?)),
        )
        .expect_at_least(1),
    ]
}
