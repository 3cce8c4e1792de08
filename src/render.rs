//! Bin-only table rendering: a hand-rolled fixed-width grid, styled
//! after a `tabulate`-style `"grid"` column layout, kept out of the
//! library since it's a single binary-only concern.

use backflow::snapshot::PipelineSnapshot;

const STATUS_ACTION_COLUMNS: &[&str] = &["Service", "Status", "Action", "Admission"];

fn render_grid(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{separator}+");

    let print_row = |cells: &[String]| {
        let line: String = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!(" {cell:<width$} ", width = width))
            .collect::<Vec<_>>()
            .join("|");
        println!("|{line}|");
    };

    println!("{separator}");
    print_row(&headers.iter().map(|h| h.to_string()).collect::<Vec<_>>());
    println!("{separator}");
    for row in rows {
        print_row(row);
    }
    println!("{separator}");
}

/// Overview table: one row per service, status/action/admission flag.
pub fn print_service_overview(snapshot: &PipelineSnapshot) {
    let rows: Vec<Vec<String>> = snapshot
        .services
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                s.status.clone(),
                s.action.clone(),
                if s.is_admission_point { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    println!("\nService Status Table:");
    render_grid(STATUS_ACTION_COLUMNS, &rows);
}

/// Detail table: one row per service, with in/out/allocated/current per schema.
pub fn print_flow_detail(snapshot: &PipelineSnapshot) {
    let mut headers = vec!["Service"];
    let schema_names: Vec<&str> = snapshot
        .services
        .first()
        .map(|s| s.schemas.iter().map(|f| f.schema.as_str()).collect())
        .unwrap_or_default();
    for name in &schema_names {
        headers.push(name);
    }

    let rows: Vec<Vec<String>> = snapshot
        .services
        .iter()
        .map(|s| {
            let mut row = vec![s.name.clone()];
            for flow in &s.schemas {
                row.push(format!(
                    "{:.2}/{:.2} (cap {:.2})",
                    flow.incoming, flow.outgoing, flow.allocated_capacity
                ));
            }
            row
        })
        .collect();
    println!("\nFlow Detail (incoming/outgoing, allocated capacity):");
    render_grid(&headers, &rows);
}

/// Dependency chains from an admission point down to each overload.
pub fn print_overload_paths(paths: &[backflow::paths::OverloadPath]) {
    if paths.is_empty() {
        println!("\nNo overloaded schema slots.");
        return;
    }
    println!("\nOverload Dependency Paths:");
    for path in paths {
        println!("  {} ({}): {}", path.service, path.schema, path.path.join(" -> "));
    }
}
