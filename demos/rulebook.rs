use ruletree::{BoolOp, Record, RuleBook};

fn main() {
    let book = RuleBook::from_file("demos/eligibility.rules").expect("failed to load rules");

    println!("{book}");
    for id in book.ids() {
        println!("  {id}: {}", book.source(id).unwrap_or_default());
    }

    let record = Record::new()
        .set("age", 35_i64)
        .set("department", "Sales")
        .set("salary", 40_000_i64)
        .set("experience", 7_i64);

    let eligible = book
        .combine(["seniority", "compensation"], BoolOp::And)
        .expect("unknown rule id");

    println!(
        "seniority AND compensation: {}",
        ruletree::evaluate(eligible.as_ref(), &record)
    );
}
