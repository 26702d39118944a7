use labcheck_core::{Output, Value};
use serde_json::json;

use super::{doc, LAB_ADMIN};
use crate::step::TestStep;

pub(super) fn steps() -> Vec<TestStep> {
    vec![
        TestStep::new(
            LAB_ADMIN,
            "admin-01",
            "Ping the server",
            "db.runCommand({ ping: 1 })",
            |store| Ok(Output::Status(store.run_command(&doc(json!({"ping": 1}))?)?)),
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_ADMIN,
            "admin-02",
            "Server status with operation counters",
            "db.serverStatus()",
            |store| Ok(Output::Status(store.run_command(&doc(json!({"serverStatus": 1}))?)?)),
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_ADMIN,
            "admin-03",
            "Replica set status",
            "rs.status()",
            |store| Ok(Output::Status(store.run_command(&doc(json!({"replSetGetStatus": 1}))?)?)),
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_ADMIN,
            "admin-04",
            "Database statistics",
            "db.stats()",
            |store| Ok(Output::Status(store.run_command(&doc(json!({"dbStats": 1}))?)?)),
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_ADMIN,
            "admin-05",
            "Collection statistics",
            "db.products.stats()",
            |store| Ok(Output::Status(store.run_command(&doc(json!({"collStats": "products"}))?)?)),
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_ADMIN,
            "admin-06",
            "Build information",
            "db.version()",
            |store| Ok(Output::Status(store.run_command(&doc(json!({"buildInfo": 1}))?)?)),
        )
        .expect_at_least(1),
        TestStep::new(
            LAB_ADMIN,
            "admin-07",
            "List every collection",
            "db.getCollectionNames()",
            |store| {
                let names = store.list_collections()?.into_iter().map(Value::from).collect();
                Ok(Output::Values(names))
            },
        )
        .expect_at_least(6),
    ]
}
