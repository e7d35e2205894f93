//! heapdb demo - builds a small database and runs operator plans against it

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use heapdb::access::{CompareOp, DataType, Schema, Value};
use heapdb::catalog::TableId;
use heapdb::config::DatabaseConfig;
use heapdb::database::Database;
use heapdb::executor::{
    DeleteExecutor, ExecutionContext, FilterExecutor, InsertExecutor, JoinPredicate,
    NestedLoopJoinExecutor, Operator, Predicate, ProjectionExecutor, QueryCursor,
    SeqScanExecutor, ValuesExecutor,
};
use std::path::PathBuf;

/// heapdb - a heap-file storage engine with a page cache and iterator operators
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory
    #[arg(short = 'D', long, default_value = "./heapdb_data")]
    data_dir: PathBuf,

    /// Bytes per page
    #[arg(long, default_value = "4096")]
    page_size: usize,

    /// Buffer pool capacity in pages
    #[arg(long, default_value = "50")]
    pool_pages: usize,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = DatabaseConfig::new(&args.data_dir)
        .with_page_size(args.page_size)
        .with_buffer_pool_pages(args.pool_pages);
    let db = Database::open(config).context("Failed to open database")?;

    println!("Data directory: {}", args.data_dir.display());
    let tables = create_demo_tables(&db)?;

    let tid = db.begin_transaction();
    let context = db.context(tid);

    // students whose name contains "a"
    let scan = SeqScanExecutor::new(&context, tables.students, "s")?;
    let filter = FilterExecutor::new(Box::new(scan), Predicate::new(1, CompareOp::Like, "a"));
    run("students LIKE 'a'", Operator::stream(filter))?;

    run("enrollments", enrollments(&context, &tables)?)?;

    // drop everyone from course 2
    let scan = SeqScanExecutor::new(&context, tables.takes, "t")?;
    let filter = FilterExecutor::new(Box::new(scan), Predicate::new(1, CompareOp::Equals, 2));
    let delete = DeleteExecutor::new(context.clone(), Box::new(filter));
    run("delete takes where cid = 2", Operator::effect(delete))?;

    run("enrollments after delete", enrollments(&context, &tables)?)?;

    db.buffer_pool()
        .transaction_complete(tid, true)
        .context("Failed to commit demo transaction")?;
    db.shutdown()?;
    println!("Goodbye!");
    Ok(())
}

struct DemoTables {
    students: TableId,
    courses: TableId,
    takes: TableId,
}

/// Creates the demo tables and fills them through insert plans
fn create_demo_tables(db: &Database) -> Result<DemoTables> {
    let students_schema = Schema::from_pairs([("sid", DataType::Int32), ("name", DataType::Varchar)]);
    let courses_schema = Schema::from_pairs([("cid", DataType::Int32), ("title", DataType::Varchar)]);
    let takes_schema = Schema::from_pairs([("sid", DataType::Int32), ("cid", DataType::Int32)]);

    let tables = DemoTables {
        students: db.create_table("students", students_schema.clone())?,
        courses: db.create_table("courses", courses_schema.clone())?,
        takes: db.create_table("takes", takes_schema.clone())?,
    };

    let context = db.context(db.begin_transaction());
    let students = ["alice", "bob", "carol", "dave"]
        .iter()
        .zip(1..)
        .map(|(name, sid)| vec![Value::Int32(sid), Value::from(*name)])
        .collect();
    insert(&context, tables.students, students_schema, students)?;

    let courses = ["databases", "compilers", "networks"]
        .iter()
        .zip(1..)
        .map(|(title, cid)| vec![Value::Int32(cid), Value::from(*title)])
        .collect();
    insert(&context, tables.courses, courses_schema, courses)?;

    let takes = [(1, 1), (1, 2), (2, 2), (3, 1), (3, 3), (4, 2)]
        .iter()
        .map(|&(sid, cid)| vec![Value::Int32(sid), Value::Int32(cid)])
        .collect();
    insert(&context, tables.takes, takes_schema, takes)?;

    println!("Created tables students, courses, takes");
    Ok(tables)
}

fn insert(
    context: &ExecutionContext,
    table_id: TableId,
    schema: Schema,
    rows: Vec<Vec<Value>>,
) -> Result<()> {
    let values = ValuesExecutor::new(schema, rows)?;
    let insert = InsertExecutor::new(context.clone(), table_id, Box::new(values))?;
    let mut cursor = QueryCursor::new(Operator::effect(insert));
    cursor.collect_all()?;
    Ok(())
}

/// name, title for every (student, course) enrollment
fn enrollments(context: &ExecutionContext, tables: &DemoTables) -> Result<Operator> {
    let students = SeqScanExecutor::new(context, tables.students, "s")?;
    let takes = SeqScanExecutor::new(context, tables.takes, "t")?;
    let courses = SeqScanExecutor::new(context, tables.courses, "c")?;

    // s.sid, s.name, t.sid, t.cid
    let student_takes = NestedLoopJoinExecutor::new(
        Box::new(students),
        Box::new(takes),
        JoinPredicate::new(0, CompareOp::Equals, 0),
    );
    // ... c.cid, c.title
    let all = NestedLoopJoinExecutor::new(
        Box::new(student_takes),
        Box::new(courses),
        JoinPredicate::new(3, CompareOp::Equals, 0),
    );
    let projection = ProjectionExecutor::new(
        Box::new(all),
        vec![1, 5],
        vec![DataType::Varchar, DataType::Varchar],
    )?;
    Ok(Operator::stream(projection))
}

fn run(label: &str, plan: Operator) -> Result<()> {
    let mut cursor = QueryCursor::new(plan);
    println!();
    println!("== {} ==", label);
    println!("{}", cursor.output_schema());

    cursor.open()?;
    let mut rows = 0;
    while cursor.has_next()? {
        println!("{}", cursor.next()?);
        rows += 1;
    }
    cursor.close();
    println!("({} rows)", rows);
    Ok(())
}
