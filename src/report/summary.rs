//! Training summary shown at the end of a run

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;

use crate::model::TrainingReport;

/// Features listed in the importance section of the summary
const TOP_FEATURES: usize = 10;

/// Terminal rendering of a [`TrainingReport`]
#[derive(Debug)]
pub struct TrainingSummary<'a> {
    report: &'a TrainingReport,
}

impl<'a> TrainingSummary<'a> {
    pub fn new(report: &'a TrainingReport) -> Self {
        Self { report }
    }

    pub fn display(&self) {
        self.display_overview();
        self.display_folds();
        self.display_classes();
        self.display_importance();
    }

    fn display_overview(&self) {
        let r = self.report;
        section("📋", "TRAINING SUMMARY");

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![Cell::new("📁 Rows"), Cell::new(r.n_rows)]);
        table.add_row(vec![Cell::new("🧮 Features"), Cell::new(r.n_features)]);
        table.add_row(vec![Cell::new("🔀 Validation"), Cell::new(r.validation)]);
        table.add_row(vec![Cell::new("⚖️  Weighting"), Cell::new(r.weighting)]);
        table.add_row(vec![
            Cell::new("🔁 Folded Classes"),
            Cell::new(r.remap.folded.len()).fg(if r.remap.is_identity() {
                Color::White
            } else {
                Color::Yellow
            }),
        ]);
        table.add_row(vec![
            Cell::new("🌲 Final Rounds"),
            Cell::new(r.final_rounds).add_attribute(Attribute::Bold),
        ]);

        let color = if r.macro_f1_mean >= 0.5 {
            Color::Green
        } else if r.macro_f1_mean >= 0.3 {
            Color::Yellow
        } else {
            Color::Red
        };
        table.add_row(vec![
            Cell::new("🎯 Macro F1"),
            Cell::new(format!("{:.4} ± {:.4}", r.macro_f1_mean, r.macro_f1_std))
                .fg(color)
                .add_attribute(Attribute::Bold),
        ]);

        print_indented(&table);
    }

    fn display_folds(&self) {
        let r = self.report;
        if r.fold_best_iterations.is_empty() {
            return;
        }
        section("📈", "VALIDATION FOLDS");

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Fold").add_attribute(Attribute::Bold),
            Cell::new("Best Iteration").add_attribute(Attribute::Bold),
            Cell::new("Macro F1").add_attribute(Attribute::Bold),
        ]);
        for (i, (best, f1)) in r
            .fold_best_iterations
            .iter()
            .zip(&r.fold_macro_f1)
            .enumerate()
        {
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(best).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.4}", f1)).set_alignment(CellAlignment::Right),
            ]);
        }
        print_indented(&table);
    }

    fn display_classes(&self) {
        let r = self.report;
        section("🏷️ ", "CLASS DISTRIBUTION");

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Bundle").add_attribute(Attribute::Bold),
            Cell::new("Rows").add_attribute(Attribute::Bold),
            Cell::new("Trained As").add_attribute(Attribute::Bold),
            Cell::new("Rows After").add_attribute(Attribute::Bold),
        ]);
        for (&class, &count) in &r.class_counts_before {
            let target = r.remap.map(class);
            let after = r.class_counts_after.get(&class).copied();
            let trained_as = if target == class {
                Cell::new(target)
            } else {
                Cell::new(format!("→ {}", target)).fg(Color::Yellow)
            };
            table.add_row(vec![
                Cell::new(class),
                Cell::new(count).set_alignment(CellAlignment::Right),
                trained_as,
                Cell::new(after.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()))
                    .set_alignment(CellAlignment::Right),
            ]);
        }
        print_indented(&table);
    }

    fn display_importance(&self) {
        let rows = &self.report.feature_importance;
        if rows.is_empty() {
            return;
        }
        section("🌟", "TOP FEATURES");

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Feature").add_attribute(Attribute::Bold),
            Cell::new("Logloss +").add_attribute(Attribute::Bold),
            Cell::new("Share %").add_attribute(Attribute::Bold),
        ]);
        for row in rows.iter().take(TOP_FEATURES) {
            table.add_row(vec![
                Cell::new(&row.feature),
                Cell::new(format!("{:.4}", row.importance)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.1}", 100.0 * row.share)).set_alignment(CellAlignment::Right),
            ]);
        }
        print_indented(&table);
    }
}

fn section(icon: &str, title: &str) {
    println!();
    println!("    {} {}", style(icon).cyan(), style(title).white().bold());
    println!("    {}", style("─".repeat(50)).dim());
    println!();
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}
