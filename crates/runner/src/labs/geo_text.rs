use labcheck_core::{FindOptions, Output};
use serde_json::json;

use super::{doc, pipeline, LAB_GEO_TEXT};
use crate::step::TestStep;

/// Downtown Austin, `[lng, lat]`.
const AUSTIN: [f64; 2] = [-97.7431, 30.2672];

pub(super) fn steps() -> Vec<TestStep> {
    vec![
        TestStep::new(
            LAB_GEO_TEXT,
            "geo-01",
            "Stores within 50 km of downtown Austin",
            r#"db.stores.find({ location: { $near: { $geometry: { type: "Point", coordinates: [-97.7431, 30.2672] }, $maxDistance: 50000 } } })"#,
            |store| {
                let filter = doc(json!({"location": {"$near": {
                    "$geometry": {"type": "Point", "coordinates": AUSTIN},
                    "$maxDistance": 50000
                }}}))?;
                Ok(Output::Cursor(store.find("stores", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(2),
        TestStep::new(
            LAB_GEO_TEXT,
            "geo-02",
            "Stores within 300 miles, by spherical radius",
            "db.stores.find({ location: { $geoWithin: { $centerSphere: [[-97.7431, 30.2672], 300 / 3963.2] } } })",
            |store| {
                let filter = doc(json!({"location": {"$geoWithin": {"$centerSphere": [AUSTIN, 300.0 / 3963.2]}}}))?;
                Ok(Output::Cursor(store.find("stores", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(4),
        TestStep::new(
            LAB_GEO_TEXT,
            "geo-03",
            "Stores inside a bounding box",
            "db.stores.find({ location: { $geoWithin: { $box: [[-98, 30], [-97, 31]] } } })",
            |store| {
                let filter = doc(json!({"location": {"$geoWithin": {"$box": [[-98.0, 30.0], [-97.0, 31.0]]}}}))?;
                Ok(Output::Cursor(store.find("stores", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(2),
        TestStep::new(
            LAB_GEO_TEXT,
            "geo-04",
            "Two stores nearest to Houston with distances",
            r#"db.stores.aggregate([{ $geoNear: { near: { type: "Point", coordinates: [-95.3698, 29.7604] }, distanceField: "distance_m" } }, { $limit: 2 }])"#,
            |store| {
                let stages = pipeline(json!([
                    {"$geoNear": {
                        "near": {"type": "Point", "coordinates": [-95.3698, 29.7604]},
                        "distanceField": "distance_m"
                    }},
                    {"$limit": 2}
                ]))?;
                Ok(Output::Documents(store.aggregate("stores", &stages)?))
            },
        )
        .expect_at_least(2),
        TestStep::new(
            LAB_GEO_TEXT,
            "text-01",
            "Full-text search for a single term",
            r#"db.products.find({ $text: { $search: "coffee" } })"#,
            |store| {
                let filter = doc(json!({"$text": {"$search": "coffee"}}))?;
                Ok(Output::Cursor(store.find("products", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_GEO_TEXT,
            "text-02",
            "Exact phrase search",
            r#"db.products.find({ $text: { $search: "\"standing desk\"" } })"#,
            |store| {
                let filter = doc(json!({"$text": {"$search": "\"standing desk\""}}))?;
                Ok(Output::Cursor(store.find("products", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_GEO_TEXT,
            "text-03",
            "Search with an excluded term",
            r#"db.products.find({ $text: { $search: "keyboard headphones -wireless" } })"#,
            |store| {
                let filter = doc(json!({"$text": {"$search": "keyboard headphones -wireless"}}))?;
                Ok(Output::Cursor(store.find("products", &filter, FindOptions::default())?))
            },
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_GEO_TEXT,
            "text-04",
            "Rank matches by relevance",
            r#"db.products.find({ $text: { $search: "coffee espresso" } }, { name: 1, score: { $meta: "textScore" } }).sort({ score: { $meta: "textScore" } })"#,
            |store| {
                let options = FindOptions::new()
                    .projection(doc(json!({"name": 1, "score": {"$meta": "textScore"}}))?)
                    .sort(doc(json!({"score": {"$meta": "textScore"}}))?);
                let filter = doc(json!({"$text": {"$search": "coffee espresso"}}))?;
                Ok(Output::Cursor(store.find("products", &filter, options)?))
            },
        )
        .expect_at_least(2),
    ]
}
