// src/report.rs

//! Operator-facing console lines. Logs go through `tracing`; this is stdout.

use crate::{
    analysis::{BattalionResponse, DistrictCount, MonthCount},
    pipeline::RunReport,
    schema::ValidationReport,
};

const RULE: &str = "===================================";

fn or_none<'a>(items: impl Iterator<Item = &'a String>, empty: &str) -> String {
    let joined: Vec<&str> = items.map(String::as_str).collect();
    if joined.is_empty() {
        empty.to_string()
    } else {
        format!("{{{}}}", joined.join(", "))
    }
}

pub fn print_validation(report: &ValidationReport) {
    if report.passed() {
        println!("====> Schema validation passed.");
        return;
    }
    println!(
        "====> Missing columns: {}",
        or_none(report.missing.iter(), "No missing columns")
    );
    println!(
        "====> Extra columns: {}",
        or_none(report.extra.iter(), "No extra columns")
    );
    if report.mismatches.is_empty() {
        println!("====> Type mismatches: No type mismatches");
    } else {
        let m: Vec<String> = report
            .mismatches
            .iter()
            .map(|(c, t)| format!("{}: {}", c, t))
            .collect();
        println!("====> Type mismatches: {{{}}}", m.join(", "));
    }
}

pub fn print_trends(rows: &[MonthCount]) {
    println!("====> Incident trends over time:");
    println!("{}", RULE);
    println!("{:<14} {:>8}", "incident_month", "count");
    for r in rows {
        println!("{:<14} {:>8}", r.month.format("%Y-%m-%d"), r.count);
    }
    println!("{}", RULE);
}

pub fn print_neighborhoods(rows: &[DistrictCount]) {
    println!("====> Neighborhood incident counts:");
    println!("{}", RULE);
    println!("{:<32} {:>8}", "neighborhood_district", "count");
    for r in rows {
        println!("{:<32} {:>8}", r.district, r.count);
    }
    println!("{}", RULE);
}

pub fn print_response_times(rows: &[BattalionResponse]) {
    println!("====> Average response time by battalion:");
    println!("{}", RULE);
    println!("{:<10} {:>18}", "Battalion", "avg_response_time");
    for r in rows {
        match r.avg_response_secs {
            Some(secs) => println!("{:<10} {:>18.2}", r.battalion, secs),
            None => println!("{:<10} {:>18}", r.battalion, "NaN"),
        }
    }
    println!("{}", RULE);
}

pub fn print_run(report: &RunReport) {
    print_validation(&report.validation);
    println!(
        "====> Total Records Has Been Loaded: {}",
        report.extract.rows
    );
    println!(
        "====> Total Records Has Been Updated: {}",
        report.transform.rows_out
    );
    println!(
        "====> Partitioned table rows: {} (district index {})",
        report.load.rows, report.load.index
    );
    print_trends(&report.trends);
    print_neighborhoods(&report.neighborhoods);
    print_response_times(&report.response_times);
}
