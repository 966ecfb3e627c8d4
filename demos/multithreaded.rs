use std::sync::Arc;
use std::thread;

use ruletree::{parse, Record};

fn main() {
    let rule = Arc::new(
        parse("age > 17 AND status = 'active'").expect("failed to parse rule"),
    );

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let rule = Arc::clone(&rule);
            thread::spawn(move || {
                let record = Record::new()
                    .set("age", 16_i64 + i64::from(i))
                    .set("status", "active");

                let result = ruletree::evaluate(Some(rule.as_ref()), &record);
                println!("Thread {i}: {result}");
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}
