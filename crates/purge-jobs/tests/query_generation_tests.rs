//! Query generation against an in-memory catalog.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use serde_json::json;

use purge_jobs::error::{Error, Result};
use purge_jobs::queries::catalog::{CatalogColumn, InMemoryCatalog, TableMetadata};
use purge_jobs::queries::{
    ColumnMatches, DataMapper, DeletionQueueItem, MatchValue, PartitionValue, QueryDescriptor,
    QueryExecutorParameters, QueryGenerator,
};

fn mapper(id: &str, table: &str) -> DataMapper {
    DataMapper {
        data_mapper_id: id.into(),
        columns: vec!["customer_id".into()],
        query_executor_parameters: QueryExecutorParameters {
            database: "test_db".into(),
            table: table.into(),
        },
    }
}

fn item(match_id: &str, mappers: &[&str]) -> DeletionQueueItem {
    DeletionQueueItem {
        match_id: match_id.into(),
        data_mappers: mappers.iter().map(|m| (*m).to_string()).collect(),
    }
}

fn table(name: &str, column_type: &str) -> TableMetadata {
    TableMetadata::new(name, vec![CatalogColumn::new("customer_id", column_type)])
}

fn generator(catalog: InMemoryCatalog) -> QueryGenerator {
    QueryGenerator::new(Arc::new(catalog))
}

#[tokio::test]
async fn unpartitioned_table_yields_one_query() -> Result<()> {
    let generator = generator(InMemoryCatalog::new().with_table("test_db", table("test_table", "string")));

    let queries = generator
        .generate(&[mapper("a", "test_table")], &[item("hi", &["a"])])
        .await?;

    assert_eq!(
        queries,
        vec![QueryDescriptor {
            data_mapper_id: "a".into(),
            database: "test_db".into(),
            table: "test_table".into(),
            columns: vec![ColumnMatches {
                column: "customer_id".into(),
                match_ids: vec![MatchValue::Text("hi".into())],
            }],
            partition_keys: None,
        }]
    );
    Ok(())
}

#[tokio::test]
async fn partitioned_table_yields_one_query_per_partition() -> Result<()> {
    let catalog = InMemoryCatalog::new()
        .with_table(
            "test_db",
            table("events", "string").with_partition_keys(["year", "month"]),
        )
        .with_partition("test_db", "events", ["2019", "01"])
        .with_partition("test_db", "events", ["2019", "02"]);

    let queries = generator(catalog)
        .generate(&[mapper("a", "events")], &[item("hi", &[])])
        .await?;

    assert_eq!(queries.len(), 2);
    assert_eq!(
        queries[1].partition_keys,
        Some(vec![
            PartitionValue {
                key: "year".into(),
                value: "2019".into()
            },
            PartitionValue {
                key: "month".into(),
                value: "02".into()
            },
        ])
    );

    let wire = serde_json::to_value(&queries[0])?;
    assert_eq!(
        wire["PartitionKeys"],
        json!([{"Key": "year", "Value": "2019"}, {"Key": "month", "Value": "01"}])
    );
    assert_eq!(wire["Columns"], json!([{"Column": "customer_id", "MatchIds": ["hi"]}]));
    Ok(())
}

#[tokio::test]
async fn mappers_without_applicable_items_are_dropped() -> Result<()> {
    let catalog = InMemoryCatalog::new()
        .with_table("test_db", table("table_a", "string"))
        .with_table("test_db", table("table_b", "string"));

    let queries = generator(catalog)
        .generate(
            &[mapper("A", "table_a"), mapper("B", "table_b")],
            &[item("hi", &["A"])],
        )
        .await?;

    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].data_mapper_id, "A");
    Ok(())
}

#[tokio::test]
async fn dropping_a_mapper_does_not_skip_the_next() -> Result<()> {
    let catalog = InMemoryCatalog::new()
        .with_table("test_db", table("table_a", "string"))
        .with_table("test_db", table("table_b", "string"))
        .with_table("test_db", table("table_c", "string"));

    let queries = generator(catalog)
        .generate(
            &[
                mapper("A", "table_a"),
                mapper("B", "table_b"),
                mapper("C", "table_c"),
            ],
            &[item("x", &["B", "C"])],
        )
        .await?;

    let ids: Vec<&str> = queries.iter().map(|q| q.data_mapper_id.as_str()).collect();
    assert_eq!(ids, vec!["B", "C"]);
    Ok(())
}

#[tokio::test]
async fn bigint_match_ids_are_coerced() -> Result<()> {
    let generator = generator(InMemoryCatalog::new().with_table("test_db", table("t", "bigint")));

    let queries = generator
        .generate(&[mapper("a", "t")], &[item("123", &[])])
        .await?;

    assert_eq!(queries[0].columns[0].match_ids, vec![MatchValue::Integer(123)]);
    let wire = serde_json::to_value(&queries[0])?;
    assert_eq!(wire["Columns"][0]["MatchIds"], json!([123]));
    Ok(())
}

#[tokio::test]
async fn unsupported_column_type_is_fatal() {
    let generator = generator(InMemoryCatalog::new().with_table("test_db", table("t", "map<string,string>")));

    let result = generator
        .generate(&[mapper("a", "t")], &[item("123", &[])])
        .await;

    assert!(matches!(
        result,
        Err(Error::UnsupportedColumnType { ref column_type, .. }) if column_type == "map<string,string>"
    ));
}

#[tokio::test]
async fn missing_table_is_fatal() {
    let result = generator(InMemoryCatalog::new())
        .generate(&[mapper("a", "nope")], &[item("1", &[])])
        .await;

    assert!(matches!(result, Err(Error::TableNotFound { .. })));
}
