//! Plain-text rendering of master replies.

use peloton_core::{GlobalStatistics, SegmentLeaderboard, Totals, UserStatistics};
use peloton_sdk::RouteReport;
use std::fmt::Write as _;

pub fn render_report(report: &RouteReport) -> String {
    let mut out = String::new();
    let a = &report.activity;
    let _ = writeln!(out, "Route {} for {}", a.route_id, report.user.user);
    let _ = writeln!(out, "  distance   {:>9.2} km", a.distance_km);
    let _ = writeln!(out, "  time       {:>9.1} min", a.time_min);
    let _ = writeln!(out, "  avg speed  {:>9.2} km/h", a.speed_kmh);
    let _ = writeln!(out, "  elev gain  {:>9.1} m", a.elevation_gain_m);
    if a.segments.is_empty() {
        let _ = writeln!(out, "  no segments matched");
    } else {
        let _ = writeln!(out, "  segments:");
        for s in &a.segments {
            let rank = report
                .leaderboards
                .iter()
                .find(|b| b.segment_id == s.segment_id)
                .and_then(|b| rank_for_time(b, &report.user.user, s.time_min));
            match rank {
                Some((rank, total)) => {
                    let _ = writeln!(
                        out,
                        "    {:<24} {:>7.2} min  #{}/{}",
                        s.file_name, s.time_min, rank, total
                    );
                }
                None => {
                    let _ = writeln!(out, "    {:<24} {:>7.2} min", s.file_name, s.time_min);
                }
            }
        }
    }
    out.push('\n');
    out.push_str(&render_statistics(&report.user, &report.global));
    out
}

pub fn render_statistics(user: &UserStatistics, global: &GlobalStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<12} {:>8} {:>12} {:>12} {:>12}", "", "routes", "km", "min", "gain m");
    write_totals(&mut out, &user.user, &user.totals);
    write_totals(&mut out, &format!("all ({})", global.users), &global.totals);
    let _ = writeln!(
        out,
        "{:<12} {:>8} {:>12.2} {:>12.1} {:>12.1}",
        "you/route",
        "",
        user.totals.average_distance_km(),
        user.totals.average_time_min(),
        user.totals.average_elevation_gain_m()
    );
    out
}

fn write_totals(out: &mut String, label: &str, totals: &Totals) {
    let _ = writeln!(
        out,
        "{:<12} {:>8} {:>12.2} {:>12.1} {:>12.1}",
        label, totals.routes, totals.distance_km, totals.time_min, totals.elevation_gain_m
    );
}

/// Render leaderboards, marking `user`'s entries.
pub fn render_leaderboards(boards: &[SegmentLeaderboard], user: &str) -> String {
    if boards.is_empty() {
        return format!("{user} has no segment times yet\n");
    }
    let mut out = String::new();
    for board in boards {
        let _ = writeln!(out, "{} ({})", board.file_name, board.segment_id);
        for (i, entry) in board.entries().enumerate() {
            let marker = if entry.user == user { '*' } else { ' ' };
            let _ = writeln!(
                out,
                "  {marker}{:>3}. {:<20} {:>8.2} min",
                i + 1,
                entry.user,
                entry.time_min
            );
        }
    }
    out
}

fn rank_for_time(board: &SegmentLeaderboard, user: &str, time_min: f64) -> Option<(usize, usize)> {
    board
        .entries()
        .position(|e| e.user == user && e.time_min == time_min)
        .map(|p| (p + 1, board.len()))
}
