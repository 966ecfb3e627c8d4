use ruletree::{combine_rules, explain, BoolOp, Record};

fn main() {
    // Two independent rules merged into one: either one qualifies.
    let rule = combine_rules(
        [
            "age > 30 AND department = 'Sales'",
            "age < 25 AND department = 'Marketing'",
        ],
        BoolOp::Or,
    )
    .expect("failed to parse rules")
    .expect("at least one rule");

    println!("Combined: {rule}");

    let record = Record::new()
        .set("age", 22_i64)
        .set("department", "Marketing");

    let report = explain(Some(&rule), &record);

    println!("{report}");
    println!();
    for outcome in report.conditions() {
        println!(
            "  {} (observed {:?}) => {}",
            outcome.condition, outcome.observed, outcome.result
        );
    }
    println!("Duration: {:?}", report.duration());
}
