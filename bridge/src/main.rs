use std::collections::BTreeSet;
use std::env;

use bridge_orm::{
    AccountSearchFilters, BuiltQuery, ClassifiedError, ConstraintCatalog, ConstraintViolationConverter, Database,
    Entity, MembershipFilter, Pagination, QueryBuilder,
};
use dotenvy::dotenv;
use serde::Serialize;
use uuid::Uuid;

#[derive(Entity)]
#[allow(dead_code)]
struct Organization {
    identifier: String,
}

#[derive(Entity)]
#[allow(dead_code)]
struct Session {
    guid: Uuid,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
struct AccountSummary {
    id: String,
    org_membership: Option<String>,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS organizations (identifier VARCHAR(60) PRIMARY KEY)",
    "CREATE TABLE IF NOT EXISTS accounts (id VARCHAR(60) PRIMARY KEY, app_id VARCHAR(60) NOT NULL, \
     study_id VARCHAR(60), org_membership VARCHAR(60) REFERENCES organizations(identifier), \
     withdrawn_on VARCHAR(40))",
    "CREATE TABLE IF NOT EXISTS sessions (guid VARCHAR(60) NOT NULL, schedule_guid VARCHAR(60) NOT NULL, \
     UNIQUE (guid, schedule_guid))",
];

fn statement(sql: &str) -> BuiltQuery {
    QueryBuilder::with_base(sql).build()
}

/// Accounts of `app_id`, as a study coordinator with access to `studies` would search them.
fn account_search(select: &str, app_id: &str, studies: &[&str], suffix: &str) -> BuiltQuery {
    let mut builder = QueryBuilder::with_base(format!("{} FROM accounts WHERE app_id = :appId", select));
    builder
        .bind("appId", app_id)
        .restrict_to_allowed(Some("study1"), studies, "study_id", "studies")
        .scoped_equality(Some("org1"), "org_membership", "orgId")
        .membership_filter(Some(MembershipFilter::Enrolled), "withdrawn_on")
        .append(suffix);
    builder.build()
}

async fn seed(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    for sql in SCHEMA {
        db.execute(&statement(sql)).await?;
    }
    let mut insert = QueryBuilder::new();
    insert.append_param("INSERT INTO organizations (identifier) VALUES (:identifier)", "identifier", "org1");
    db.execute(&insert.build()).await?;

    for (i, org) in [Some("org1"), Some("org1"), None].into_iter().enumerate() {
        let mut insert = QueryBuilder::new();
        insert
            .append_params(
                "INSERT INTO accounts VALUES (:id, :appId,",
                "id",
                format!("account{}", i + 1),
                "appId",
                "api",
            )
            .append_params(":studyId, :orgId, NULL)", "studyId", "study1", "orgId", org);
        db.execute(&insert.build()).await?;
    }
    Ok(())
}

fn report(action: &str, result: Result<u64, ClassifiedError>) {
    match result {
        Ok(rows) => println!("{}: {} row(s)", action, rows),
        Err(ClassifiedError::Unclassified(e)) => log::error!("{} failed: {}", action, e),
        Err(e) => println!("{}: {} {}", action, e.status_code(), e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    let catalog = match env::var("CONSTRAINT_CATALOG") {
        Ok(path) => ConstraintCatalog::from_json_file(&path)?,
        Err(_) => ConstraintCatalog::default(),
    };
    let converter = ConstraintViolationConverter::new(catalog);

    // object-query form of the account search; only printed
    let mut hql = QueryBuilder::with_base("FROM Account AS acct WHERE acct.appId = :appId");
    let required: BTreeSet<String> = ["group1", "group2"].map(String::from).into();
    let excluded: BTreeSet<String> = ["test_user"].map(String::from).into();
    let caller_studies: BTreeSet<String> = ["study1", "study2"].map(String::from).into();
    hql.bind("appId", "api")
        .data_groups(Some(&required), "IN")
        .data_groups(Some(&excluded), "NOT IN")
        .admin_only(Some(false))
        .enrolled_in_study(&caller_studies, Some("study1"))
        .org_membership(Some("<none>"))
        .enrollment(Some(MembershipFilter::Withdrawn));
    println!("{}", serde_json::to_string_pretty(&hql.build())?);

    let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
    let db = Database::builder().max_connections(1).connect(&url).await?;
    seed(&db).await?;

    let pagination = Pagination::default();
    let page = db
        .fetch_page::<AccountSummary>(
            &account_search("SELECT id, org_membership", "api", &["study1"], "ORDER BY id"),
            &account_search("SELECT COUNT(*)", "api", &["study1"], ""),
            &pagination,
        )
        .await?;
    println!("{}", serde_json::to_string_pretty(&page)?);

    let hidden = db.fetch_count(&account_search("SELECT COUNT(*)", "api", &["study2"], "")).await?;
    println!("accounts visible without access to study1: {}", hidden);

    let session = Session { guid: Uuid::new_v4() };
    let mut insert = QueryBuilder::new();
    insert.append_params(
        "INSERT INTO sessions (guid, schedule_guid) VALUES (:guid, :scheduleGuid)",
        "guid",
        session.guid,
        "scheduleGuid",
        "schedule1",
    );
    let insert = insert.build();
    report("insert session", db.execute_for(&insert, &session, &converter).await);
    report("insert session again", db.execute_for(&insert, &session, &converter).await);

    let organization = Organization { identifier: "org1".to_string() };
    let mut delete = QueryBuilder::new();
    delete.append_param("DELETE FROM organizations WHERE identifier = :identifier", "identifier", "org1");
    report("delete organization", db.execute_for(&delete.build(), &organization, &converter).await);

    Ok(())
}
