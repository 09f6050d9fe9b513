use core::time::Duration;
use std::io::{self, Write};

use serde::Serialize;

use crate::stats::StatsSnapshot;

/// Throughput observed during one reporting interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntervalReport {
    /// Time since the blast started, in seconds.
    pub elapsed_secs: f64,
    /// Successful replies within this interval.
    pub replies: u64,
    /// Replies per second, over the nominal interval length.
    pub reply_rate: f64,
}

impl IntervalReport {
    pub fn new(elapsed: Duration, replies: u64, period: Duration) -> Self {
        Self {
            elapsed_secs: elapsed.as_secs_f64(),
            replies,
            reply_rate: replies as f64 / period.as_secs_f64(),
        }
    }
}

/// Number of outcomes with the given failure label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCount {
    pub status: String,
    pub count: u64,
}

/// Cumulative summary of a blast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Wall time between blast start and completion, in seconds.
    pub elapsed_secs: f64,
    /// The number of requests the blast was configured with.
    pub request_total: u64,
    /// The number of requests that reached a terminal outcome.
    pub complete_total: u64,
    pub reply_total: u64,
    pub bytes_total: u64,
    /// Completed requests per second.
    pub request_rate: f64,
    /// Successful replies per second.
    pub reply_rate: f64,
    /// Connection time, in milliseconds.
    pub dial: StatsSnapshot,
    /// Time from dial start to reply completion, in milliseconds.
    pub round_trip: StatsSnapshot,
    /// Failures by status, most frequent first.
    pub errors: Vec<ErrorCount>,
    /// Whether the blast was stopped before issuing every request.
    pub stopped: bool,
}

impl RunReport {
    #[inline]
    pub fn num_samples(&self) -> u64 {
        self.dial.count
    }

    #[inline]
    pub fn num_errors(&self) -> u64 {
        self.errors.iter().map(|e| e.count).sum()
    }
}

/// Report consumer.
pub trait Sink {
    fn interval(&mut self, report: &IntervalReport) -> io::Result<()>;
    fn summary(&mut self, report: &RunReport) -> io::Result<()>;
}

/// Human-readable, line-oriented output.
///
/// The line layout is stable, so that existing log scrapers keep working.
#[derive(Debug)]
pub struct TextSink<W> {
    wr: W,
}

impl<W> TextSink<W> {
    pub const fn new(wr: W) -> Self {
        Self { wr }
    }

    pub fn into_inner(self) -> W {
        self.wr
    }
}

impl<W: Write> Sink for TextSink<W> {
    fn interval(&mut self, report: &IntervalReport) -> io::Result<()> {
        writeln!(self.wr, "reply rate: {:.2} ", report.reply_rate)?;
        self.wr.flush()
    }

    fn summary(&mut self, r: &RunReport) -> io::Result<()> {
        let wr = &mut self.wr;

        writeln!(wr, "Blast duration {} s", r.elapsed_secs as u64)?;
        writeln!(wr, "{} requests at {:.2} request/s", r.complete_total, r.request_rate)?;
        writeln!(wr, "{} replys at {:.2} reply/s", r.reply_total, r.reply_rate)?;
        writeln!(wr, "{} samples collected", r.num_samples())?;
        writeln!(wr, "Connection time: {:.2} ± {:.2} (ms)", r.dial.mean, r.dial.stddev)?;
        writeln!(wr, "Reply time: {:.2} ± {:.2} (ms)", r.round_trip.mean, r.round_trip.stddev)?;
        if !r.errors.is_empty() {
            writeln!(wr, "Errors breakdown:")?;
            for e in &r.errors {
                writeln!(wr, "\t{} {}", e.count, e.status)?;
            }
        }

        wr.flush()
    }
}

/// One JSON object per line.
#[derive(Debug)]
pub struct JsonSink<W> {
    wr: W,
}

impl<W> JsonSink<W> {
    pub const fn new(wr: W) -> Self {
        Self { wr }
    }

    pub fn into_inner(self) -> W {
        self.wr
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Record<'a> {
    Interval(&'a IntervalReport),
    Summary(&'a RunReport),
}

impl<W: Write> JsonSink<W> {
    fn write(&mut self, record: &Record) -> io::Result<()> {
        serde_json::to_writer(&mut self.wr, record)?;
        self.wr.write_all(b"\n")?;
        self.wr.flush()
    }
}

impl<W: Write> Sink for JsonSink<W> {
    #[inline]
    fn interval(&mut self, report: &IntervalReport) -> io::Result<()> {
        self.write(&Record::Interval(report))
    }

    #[inline]
    fn summary(&mut self, report: &RunReport) -> io::Result<()> {
        self.write(&Record::Summary(report))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn report(errors: Vec<ErrorCount>) -> RunReport {
        RunReport {
            elapsed_secs: 2.5,
            request_total: 100,
            complete_total: 100,
            reply_total: 100 - errors.iter().map(|e| e.count).sum::<u64>(),
            bytes_total: 2200,
            request_rate: 40.0,
            reply_rate: 36.0,
            dial: StatsSnapshot { count: 3, mean: 1.5, stddev: 0.25 },
            round_trip: StatsSnapshot { count: 3, mean: 4.0, stddev: 1.0 },
            errors,
            stopped: false,
        }
    }

    #[test]
    fn test_text_summary() {
        let mut sink = TextSink::new(Vec::new());
        let errors = vec![
            ErrorCount { status: "timeouts".into(), count: 7 },
            ErrorCount { status: "connection errors".into(), count: 3 },
        ];
        sink.summary(&report(errors)).unwrap();

        let expected = "\
Blast duration 2 s
100 requests at 40.00 request/s
90 replys at 36.00 reply/s
3 samples collected
Connection time: 1.50 ± 0.25 (ms)
Reply time: 4.00 ± 1.00 (ms)
Errors breakdown:
\t7 timeouts
\t3 connection errors
";
        assert_eq!(expected, String::from_utf8(sink.into_inner()).unwrap());
    }

    #[test]
    fn test_text_summary_without_errors() {
        let mut sink = TextSink::new(Vec::new());
        sink.summary(&report(Vec::new())).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.contains("100 replys at"));
        assert!(!out.contains("Errors breakdown"));
    }

    #[test]
    fn test_text_interval() {
        let mut sink = TextSink::new(Vec::new());
        let r = IntervalReport::new(Duration::from_secs(5), 50, Duration::from_secs(5));
        sink.interval(&r).unwrap();

        assert_eq!("reply rate: 10.00 \n", String::from_utf8(sink.into_inner()).unwrap());
    }

    #[test]
    fn test_json_records() {
        let mut sink = JsonSink::new(Vec::new());
        let r = IntervalReport::new(Duration::from_secs(1), 3, Duration::from_secs(1));
        sink.interval(&r).unwrap();
        sink.summary(&report(Vec::new())).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();

        assert_eq!(2, lines.len());
        assert_eq!("interval", lines[0]["type"]);
        assert_eq!(3, lines[0]["replies"]);
        assert_eq!("summary", lines[1]["type"]);
        assert_eq!(100, lines[1]["reply_total"]);
    }
}
