use std::ops::Range;

use colored::{Color, ColoredString, Colorize};
use crossterm::terminal;

use crate::color::{DefaultPalette, SemanticColor};
use crate::testing::{CaseReport, JudgeReport, RunOutcome, Summary};

#[macro_export]
macro_rules! print_success {
    ($fmt:literal, $($e:tt)*) => {{
        use ::colored::Colorize as _;
        println!("{}", format!($fmt, $($e)*).green())
    }}
}

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false
    };
    matches!(v.as_str(), "truecolor" | "24bit")
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for RunOutcome {
    fn color(&self) -> Color {
        use RunOutcome::*;
        if !self::is_truecolor_supported() {
            return match self {
                Correct => Color::Green,
                NoAnswerProvided => Color::Yellow,
                WrongAnswer => Color::Red,
                PresentationError => Color::BrightRed,
                NoOutputProduced => Color::BrightBlack,
                TimeLimitExceeded => Color::Blue,
                RuntimeError => Color::Magenta,
            };
        }

        let (r, g, b) = match self {
            Correct => (30, 180, 40),
            NoAnswerProvided => (210, 170, 20),
            WrongAnswer => (220, 42, 42),
            PresentationError => (230, 110, 90),
            NoOutputProduced => (120, 120, 120),
            TimeLimitExceeded => (40, 110, 220),
            RuntimeError => (171, 40, 200),
        };
        Color::TrueColor { r, g, b }
    }
}

pub fn outcome_icon(outcome: RunOutcome) -> ColoredString {
    let fg = if is_truecolor_supported() {
        Color::TrueColor {
            r: 255,
            g: 255,
            b: 255,
        }
    } else {
        Color::BrightWhite
    };
    format!(" {:<3} ", outcome.abbrev())
        .on_color(outcome.color())
        .bold()
        .color(fg)
}

fn terminal_cols() -> usize {
    terminal::size().map(|(cols, _)| cols as usize).unwrap_or(40)
}

/// `sample1  AC  [12ms] Correct`
pub fn print_case_line(case: &CaseReport) {
    println!(
        "{} {} [{}ms] {}",
        case.test_id.bright_yellow().bold(),
        self::outcome_icon(case.outcome),
        case.elapsed.as_millis(),
        case.outcome.label().color(case.outcome.color()),
    );
}

/// Diff of the expected answer against the produced output, then stderr, each
/// cut to the given line count. Without a usable answer the two are printed as
/// separate blocks.
pub fn print_case_detail(case: &CaseReport, max_lines_output: usize, max_lines_error: usize) {
    let cols = terminal_cols();

    const BOLD_LINE: &str = "━";
    const THIN_LINE: &str = "─";

    let bold_bar = BOLD_LINE.repeat(cols).blue().bold();

    println!(
        "\n{}: {} [{}ms] ({})\n{}",
        case.test_id.bright_yellow().bold(),
        self::outcome_icon(case.outcome),
        case.elapsed.as_millis(),
        case.termination,
        bold_bar,
    );

    let print_sub_title = |s: &str| {
        println!(
            "{}{}",
            s.cyan().bold(),
            THIN_LINE.repeat(cols.saturating_sub(s.len() + 1)).bright_black(),
        )
    };

    let output = String::from_utf8_lossy(&case.output);
    match case.answer.as_deref().map(String::from_utf8_lossy) {
        Some(answer) => match diff_lines(&answer, &output) {
            Some(diff) if !output.is_empty() => {
                print_sub_title("[diff] -answer +output");
                print_diff(&diff, max_lines_output);
                if answer.ends_with('\n') && !output.ends_with('\n') {
                    println!("{}", " Missing new line at end of output ".on_yellow().black().bold());
                }
            }
            _ => {
                print_sub_title("[answer]");
                print_text(&answer, max_lines_output);
                print_sub_title("[output]");
                print_text(&output, max_lines_output);
            }
        },
        None => {
            print_sub_title("[answer]");
            println!("{}", "<NO ANSWER FILE>".magenta().dimmed());
            print_sub_title("[output]");
            print_text(&output, max_lines_output);
        }
    }

    if !case.stderr.is_empty() {
        print_sub_title("[stderr]");
        print_text(&String::from_utf8_lossy(&case.stderr), max_lines_error);
    }

    println!("{}", bold_bar);
}

fn print_text(text: &str, max_lines: usize) {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        println!("{}", "<EMPTY>".magenta().dimmed());
        return;
    }

    for (i, line) in lines.iter().take(max_lines).enumerate() {
        let trimmed = line.trim_end();
        print!("{}", trimmed);

        let num_trailing_whitespace = line.len() - trimmed.len();
        if num_trailing_whitespace > 0 {
            print!(
                "{}{}",
                " ".repeat(num_trailing_whitespace).on_red(),
                "(Trailing whitespace)".bright_red().bold()
            );
        }

        let is_last_line = i + 1 == lines.len();
        if is_last_line && !text.ends_with('\n') {
            print!("{}", " Missing new line ".on_yellow().black().bold());
        }

        println!();
    }

    if lines.len() > max_lines {
        println!(
            "{}",
            format!("... ({} more lines)", lines.len() - max_lines).dimmed()
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLine<'a> {
    Same(&'a str),
    Removed(&'a str),
    Added(&'a str),
}

/// Line diff turning `expected` into `actual`, built from their longest common
/// subsequence. `None` when the inputs are too large to diff.
pub fn diff_lines<'a>(expected: &'a str, actual: &'a str) -> Option<Vec<DiffLine<'a>>> {
    use DiffLine::*;
    const MAX_CELLS: usize = 4_000_000;

    let a: Vec<&str> = expected.lines().collect();
    let b: Vec<&str> = actual.lines().collect();
    if a.len().saturating_mul(b.len()) > MAX_CELLS {
        return None;
    }

    // lcs[i * w + j]: length of the LCS of a[i..] and b[j..]
    let w = b.len() + 1;
    let mut lcs = vec![0u32; (a.len() + 1) * w];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i * w + j] = if a[i] == b[j] {
                lcs[(i + 1) * w + j + 1] + 1
            } else {
                lcs[(i + 1) * w + j].max(lcs[i * w + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    let mut res = Vec::with_capacity(a.len().max(b.len()));
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            res.push(Same(a[i]));
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * w + j] >= lcs[i * w + j + 1] {
            res.push(Removed(a[i]));
            i += 1;
        } else {
            res.push(Added(b[j]));
            j += 1;
        }
    }
    res.extend(a[i..].iter().map(|&l| Removed(l)));
    res.extend(b[j..].iter().map(|&l| Added(l)));
    Some(res)
}

/// A run of diff lines around changes, as in `@@ -old_start,old_len +new_start,new_len @@`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub range: Range<usize>,
}

/// Groups changed lines with up to `context` unchanged lines on each side.
pub fn hunks(diff: &[DiffLine], context: usize) -> Vec<Hunk> {
    let mut ranges: Vec<Range<usize>> = Vec::new();
    for (k, line) in diff.iter().enumerate() {
        if matches!(line, DiffLine::Same(_)) {
            continue;
        }
        let range = k.saturating_sub(context)..(k + context + 1).min(diff.len());
        match ranges.last_mut() {
            Some(last) if range.start <= last.end => last.end = range.end,
            _ => ranges.push(range),
        }
    }

    let (mut old_line, mut new_line, mut pos) = (1, 1, 0);
    ranges
        .into_iter()
        .map(|range| {
            for line in &diff[pos..range.start] {
                match line {
                    DiffLine::Same(_) => (old_line, new_line) = (old_line + 1, new_line + 1),
                    DiffLine::Removed(_) => old_line += 1,
                    DiffLine::Added(_) => new_line += 1,
                }
            }
            let hunk_lines = &diff[range.clone()];
            let old_len = hunk_lines.iter().filter(|l| !matches!(l, DiffLine::Added(_))).count();
            let new_len = hunk_lines.iter().filter(|l| !matches!(l, DiffLine::Removed(_))).count();
            let hunk = Hunk {
                old_start: old_line,
                old_len,
                new_start: new_line,
                new_len,
                range: range.clone(),
            };
            (old_line, new_line, pos) = (old_line + old_len, new_line + new_len, range.end);
            hunk
        })
        .collect()
}

fn print_diff(diff: &[DiffLine], max_lines: usize) {
    const CONTEXT: usize = 2;

    let all_hunks = hunks(diff, CONTEXT);
    let total: usize = all_hunks.iter().map(|h| h.range.len() + 1).sum();
    let mut printed = 0;
    for hunk in all_hunks {
        if printed >= max_lines {
            break;
        }
        println!(
            "{}",
            format!(
                "@@ -{},{} +{},{} @@",
                hunk.old_start, hunk.old_len, hunk.new_start, hunk.new_len
            )
            .cyan()
        );
        printed += 1;

        for line in &diff[hunk.range] {
            if printed >= max_lines {
                break;
            }
            match line {
                DiffLine::Same(l) => println!(" {}", l.dimmed()),
                DiffLine::Removed(l) => println!("{}", format!("-{}", l).red()),
                DiffLine::Added(l) => {
                    let trimmed = l.trim_end();
                    print!("{}", format!("+{}", trimmed).green());
                    let num_trailing_whitespace = l.len() - trimmed.len();
                    if num_trailing_whitespace > 0 {
                        print!("{}", " ".repeat(num_trailing_whitespace).on_red());
                    }
                    println!();
                }
            }
            printed += 1;
        }
    }

    if total > printed {
        println!("{}", format!("... ({} more lines)", total - printed).dimmed());
    }
}

pub fn print_summary(summary: &Summary) {
    let bar = "-".repeat(5);
    println!("{} Summary {}", bar, bar);

    let total = summary.total();
    for (outcome, count) in summary.distribution() {
        let percent = if total == 0 {
            0.0
        } else {
            100.0 * count as f64 / total as f64
        };
        let line = format!(
            "{} {:<20} {:>4} ({:>5.1}%)",
            self::outcome_icon(outcome),
            outcome.label(),
            count,
            percent
        );
        if count == 0 {
            println!("{}", line.dimmed());
        } else {
            println!("{}", line);
        }
    }

    match summary.score() {
        Some(score) if summary.all_correct() => {
            let msg = format!("All {} tests passed ✨ Score: {:.1}", total, score);
            println!("{}", msg.color(DefaultPalette.success()).bold());
        }
        Some(score) => {
            let msg = format!(
                "{}/{} tests passed. Score: {:.1}",
                summary.count(RunOutcome::Correct),
                total,
                score
            );
            println!("{}", msg.color(DefaultPalette.error()).bold());
        }
        None => println!("{}", "No tests were run".dimmed()),
    }
}

pub fn print_judge_report(report: &JudgeReport, max_lines_output: usize, max_lines_error: usize) {
    for case in &report.cases {
        print_case_line(case);
    }
    report
        .cases
        .iter()
        .filter(|case| !case.outcome.is_correct())
        .for_each(|case| print_case_detail(case, max_lines_output, max_lines_error));
    println!();
    print_summary(&report.summary);
}

#[cfg(test)]
mod test {
    use super::*;
    use DiffLine::*;

    #[test]
    fn diff_keeps_common_lines() {
        let diff = diff_lines("1\n2\n3\n", "1\n5\n3\n4\n").unwrap();
        assert_eq!(
            diff,
            vec![Same("1"), Removed("2"), Added("5"), Same("3"), Added("4")]
        );

        assert_eq!(diff_lines("a\nb\n", "a\nb").unwrap(), vec![Same("a"), Same("b")]);
        assert_eq!(diff_lines("", "x\n").unwrap(), vec![Added("x")]);
        assert_eq!(diff_lines("x", "").unwrap(), vec![Removed("x")]);
    }

    #[test]
    fn diff_shows_trailing_whitespace() {
        let diff = diff_lines("1 2\n", "1 2 \n").unwrap();
        assert_eq!(diff, vec![Removed("1 2"), Added("1 2 ")]);
    }

    #[test]
    fn hunks_merge_nearby_changes() {
        let expected = (1..=20).map(|i| format!("{}\n", i)).collect::<String>();
        let actual = (1..=20)
            .map(|i| match i {
                3 => "x\n".to_owned(),
                5 => "y\n".to_owned(),
                17 => "z\n".to_owned(),
                _ => format!("{}\n", i),
            })
            .collect::<String>();
        let diff = diff_lines(&expected, &actual).unwrap();

        let hunks = hunks(&diff, 2);
        assert_eq!(hunks.len(), 2);

        assert_eq!((hunks[0].old_start, hunks[0].old_len), (1, 7));
        assert_eq!((hunks[0].new_start, hunks[0].new_len), (1, 7));
        assert_eq!((hunks[1].old_start, hunks[1].old_len), (15, 5));
        assert_eq!((hunks[1].new_start, hunks[1].new_len), (15, 5));
    }

    #[test]
    fn identical_text_has_no_hunks() {
        let diff = diff_lines("1\n2\n", "1\n2\n").unwrap();
        assert!(hunks(&diff, 2).is_empty());
    }
}
