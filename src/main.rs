use std::sync::Arc;

use strata::buffer::BufferPoolManager;
use strata::catalog::Catalog;
use strata::execution::{
    AggregateExpression, AggregationExecutor, AggregationType, ComparisonOp, Executor,
    ExecutorContext, Expression, InsertExecutor, InsertSource, SeqScanExecutor,
};
use strata::storage::disk::DiskManager;
use strata::tuple::{DataType, Schema, Value};

fn main() -> strata::Result<()> {
    println!("Strata - disk-backed storage & indexing core");
    println!("============================================\n");

    let db_path = "demo.db";
    let disk_manager = Arc::new(DiskManager::new(db_path)?);
    let bpm = Arc::new(BufferPoolManager::new(64, disk_manager));
    let catalog = Arc::new(Catalog::new(bpm.clone()));

    // A small orders table with a primary-key index.
    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("customer", DataType::VarChar(32))
        .column("amount", DataType::Integer)
        .build();
    let table = catalog.create_table("orders", schema)?;
    catalog.create_index("orders_pk", "orders", vec![0])?;
    println!("Created table 'orders' (oid {}) with index 'orders_pk'", table.oid);

    let ctx = Arc::new(ExecutorContext::new(catalog.clone(), bpm.clone(), None));

    // Insert a few literal rows.
    let rows = vec![
        vec![Value::Integer(1), Value::from("ada"), Value::Integer(120)],
        vec![Value::Integer(2), Value::from("brian"), Value::Integer(80)],
        vec![Value::Integer(3), Value::from("ada"), Value::Integer(200)],
        vec![Value::Integer(4), Value::from("carol"), Value::Integer(40)],
    ];
    let mut insert = InsertExecutor::new(ctx.clone(), table.oid, InsertSource::Raw(rows));
    insert.init()?;
    insert.next()?;
    println!("Inserted 4 rows\n");

    // Scan with a predicate: amount >= 80.
    let predicate = Expression::comparison(
        ComparisonOp::GtEq,
        Expression::column(2),
        Expression::constant(80),
    );
    let mut scan = SeqScanExecutor::new(ctx.clone(), table.oid, Some(predicate));
    scan.init()?;
    println!("Orders with amount >= 80:");
    while let Some((tuple, rid)) = scan.next()? {
        println!("  {} -> {:?}", rid, tuple.values());
    }

    // Total amount per customer.
    let output_schema = Schema::builder()
        .column("customer", DataType::VarChar(32))
        .column("total", DataType::Integer)
        .build_arc();
    let child = Box::new(SeqScanExecutor::new(ctx.clone(), table.oid, None));
    let mut agg = AggregationExecutor::new(
        child,
        vec![Expression::column(1)],
        vec![Expression::column(2)],
        vec![AggregationType::Sum],
        None,
        vec![
            AggregateExpression::group_by(0),
            AggregateExpression::aggregate(0),
        ],
        output_schema,
    );
    agg.init()?;
    println!("\nTotal amount per customer:");
    while let Some((tuple, _)) = agg.next()? {
        println!("  {:?}", tuple.values());
    }

    bpm.flush_all()?;
    std::fs::remove_file(db_path).ok();
    println!("\nDone.");
    Ok(())
}
