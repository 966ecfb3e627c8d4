use ruletree::{evaluate, parse, Record};

fn main() {
    // Parse a rule
    let rule = parse("age > 30 AND department = 'Sales'").expect("failed to parse rule");

    println!("Rule: {rule}");

    // Evaluate against a record
    let record = Record::new()
        .set("age", 35_i64)
        .set("department", "Sales");

    if evaluate(Some(&rule), &record) {
        println!("Result: eligible");
    } else {
        println!("Result: not eligible");
    }
}
