use crate::scenario::RunReport;
use deal_processor::ResultTracker;
use std::fmt::{self, Write};

const RULE: &str = "================================================================";

pub fn write_timing(out: &mut impl Write, report: &RunReport) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "  Timing ({}):", report.scenario)?;
    writeln!(
        out,
        "    Client submission phase: {}ms",
        report.submit_elapsed.as_millis()
    )?;
    writeln!(
        out,
        "    Total processing time:   {}ms",
        report.total_elapsed.as_millis()
    )?;
    writeln!(out, "    Requests submitted:      {}", report.submitted)?;
    writeln!(out, "    Requests accepted:       {}", report.accepted)?;
    writeln!(out, "    Results delivered:       {}", report.delivered)?;
    writeln!(out, "    Lost requests:           {}", report.lost())?;
    writeln!(out, "    Throughput:              {:.1} req/sec", report.throughput())
}

/// Totals, per-client breakdown and request to ticket mapping.
pub fn write_summary(out: &mut impl Write, tracker: &ResultTracker) -> fmt::Result {
    let stats = tracker.stats();

    writeln!(out)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "                    EXECUTION SUMMARY")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "  Total Requests:   {}", stats.total())?;
    writeln!(out, "  Successful:       {}", stats.successful())?;
    writeln!(out, "  Rejected:         {}", stats.rejected())?;
    writeln!(out, "  Errors:           {}", stats.errors())?;
    writeln!(out, "  Duplicates:       {}", stats.duplicates())?;
    writeln!(out, "  Success Rate:     {:.1}%", stats.success_rate())?;
    writeln!(out, "{}", RULE)?;

    writeln!(out)?;
    writeln!(out, "  Per-Client Breakdown:")?;
    writeln!(out, "  {:<12}{:<8}{:<8}{:<8}{:<8}", "Client", "Total", "OK", "Fail", "Dup")?;
    writeln!(out, "  {}", "-".repeat(44))?;
    for submitter in tracker.submitters() {
        let s = tracker.submitter_stats(&submitter);
        let fail = s.total() - s.successful() - s.duplicates();
        writeln!(
            out,
            "  {:<12}{:<8}{:<8}{:<8}{:<8}",
            submitter.as_str(),
            s.total(),
            s.successful(),
            fail,
            s.duplicates()
        )?;
    }

    writeln!(out)?;
    writeln!(out, "  Request ID -> Ticket Mapping (successful trades):")?;
    writeln!(out, "  {:<44}{:<12}Price", "Request ID", "Ticket")?;
    writeln!(out, "  {}", "-".repeat(66))?;
    for record in tracker.tickets() {
        writeln!(
            out,
            "  {:<44}{:<12}{:.5}",
            record.request_id.as_str(),
            format!("#{}", record.ticket),
            record.price
        )?;
    }
    writeln!(out, "{}", RULE)
}
