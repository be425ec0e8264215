//! Terminal rendering of session events and reports.

use colored::Colorize;
use rover_decoder::DetectedObject;
use rover_runtime::SessionReport;
use rover_types::{
    Event, EventPayload, FaultKind, ObjectSegment, Pose, ScanSeries, SensorStatus, SessionOutcome,
    StatusField, StatusUpdate,
};
use tokio::sync::mpsc;

/// Print events until the session drops its sender.
pub async fn render_events(mut events: mpsc::Receiver<Event>) {
    while let Some(event) = events.recv().await {
        if let Some(line) = describe(&event.payload) {
            println!("{line}");
        }
    }
}

/// One terminal line for `payload`, or `None` for events shown only in the
/// final report.
pub fn describe(payload: &EventPayload) -> Option<String> {
    let line = match payload {
        EventPayload::Status(StatusUpdate::Speed(speed)) => {
            format!("  {} speed {}", "•".dimmed(), speed.to_string().bold())
        }
        EventPayload::Status(StatusUpdate::Sensor { field, value }) => {
            format!("  {} {} {}", "•".dimmed(), field_label(*field), value.bold())
        }
        EventPayload::Sample(sample) => format!(
            "  {} ping {:>6.1}°  {:>5.2} m",
            "◉".cyan(),
            sample.angle_degrees,
            sample.distance_meters
        ),
        EventPayload::Point(point) => format!(
            "    {} map ({:.2}, {:.2})",
            "→".dimmed(),
            point.x,
            point.y
        ),
        EventPayload::Object(object) => format!("  {} {}", "▣".cyan(), segment_line(object)),
        EventPayload::Warning(warning) => {
            format!("  {} {}", "⚠".yellow().bold(), warning.message.yellow())
        }
        EventPayload::Pose(pose) => format!("  {} {}", "↻".cyan(), pose_line(pose)),
        EventPayload::Goal => format!("  {}", "★ goal reached".green().bold()),
        EventPayload::Fault(fault) => {
            let tag = match fault.kind {
                FaultKind::IncompleteGroup | FaultKind::OutOfSequence => "warn".yellow(),
                _ => "fault".red(),
            };
            format!("  {} {}", tag, fault.message.dimmed())
        }
        EventPayload::Sweep(_) | EventPayload::SessionEnded { .. } => return None,
    };
    Some(line)
}

pub fn print_report(report: &SessionReport) {
    println!();
    let outcome = match report.outcome {
        SessionOutcome::Completed => "completed".green().bold(),
        SessionOutcome::Aborted => "aborted".yellow().bold(),
        SessionOutcome::Warned => "stopped by warning".yellow().bold(),
    };
    println!(
        "  {} {:?} session {} ({} lines)",
        "■".bold(),
        report.mode,
        outcome,
        report.lines_read
    );
    if !report.series.samples().is_empty() {
        println!("    samples  : {}", report.series.samples().len());
    }
    if report.series.reading_count() > 0 {
        println!("    readings : {}", report.series.reading_count());
    }
    if !report.objects.is_empty() {
        println!("    objects  : {}", report.objects.len());
    }
    if !report.faults.is_empty() {
        println!(
            "    faults   : {}",
            report.faults.len().to_string().yellow()
        );
    }
    if report.goal_reached {
        println!("    {}", "goal reached".green());
    }
    println!("    pose     : {}", pose_line(&report.pose));
    println!();
}

pub fn print_status(status: &SensorStatus, pose: &Pose, series: &ScanSeries) {
    println!("{}", "Rover Status".bold().underline());
    for field in [
        StatusField::BumperLeft,
        StatusField::BumperRight,
        StatusField::CliffLeft,
        StatusField::CliffRight,
        StatusField::LineLeft,
        StatusField::LineRight,
    ] {
        let value = status.get(field).unwrap_or("-");
        println!("  {:<13}: {}", field_label(field), value.bold());
    }
    let speed = status
        .speed
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("  {:<13}: {}", "speed", speed.bold());
    println!("  {:<13}: {}", "pose", pose_line(pose));
    println!(
        "  {:<13}: {} samples, {} readings",
        "series",
        series.samples().len(),
        series.reading_count()
    );
}

pub fn print_series(series: &ScanSeries) {
    println!(
        "  {:>7}  {:>7}  {:>7}",
        "deg".dimmed(),
        "ir".dimmed(),
        "sonar".dimmed()
    );
    for (angle, infrared, sonar) in series.readings() {
        println!("  {:>7.1}  {:>7.0}  {:>7.0}", angle.to_degrees(), infrared, sonar);
    }
}

pub fn print_objects(detected: &[DetectedObject], segments: &[ObjectSegment]) {
    println!("{}", "Objects".bold().underline());
    if detected.is_empty() && segments.is_empty() {
        println!("  {}", "none".dimmed());
        return;
    }
    for (i, obj) in detected.iter().enumerate() {
        println!(
            "  {:>2}. {:>5.1}° – {:>5.1}°  dist {:>5.1}  width {:>5.1}",
            i + 1,
            obj.start_degrees,
            obj.end_degrees,
            obj.distance,
            obj.width
        );
    }
    for segment in segments {
        println!("   {} {}", "ctrl".dimmed(), segment_line(segment));
    }
}

fn segment_line(object: &ObjectSegment) -> String {
    format!(
        "object {} → {} at {} cm",
        object.start_descriptor, object.end_descriptor, object.distance_cm
    )
}

fn pose_line(pose: &Pose) -> String {
    format!(
        "({:.2}, {:.2}) heading {:.0}° facing {}",
        pose.x, pose.y, pose.heading_degrees, pose.facing
    )
}

fn field_label(field: StatusField) -> &'static str {
    match field {
        StatusField::BumperLeft => "bumper left",
        StatusField::BumperRight => "bumper right",
        StatusField::CliffLeft => "cliff left",
        StatusField::CliffRight => "cliff right",
        StatusField::LineLeft => "line left",
        StatusField::LineRight => "line right",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_types::{FaultReport, ScanSample, SessionMode, WarningEvent};

    #[test]
    fn describe_skips_report_only_events() {
        assert!(describe(&EventPayload::Sweep(ScanSeries::new())).is_none());
        assert!(
            describe(&EventPayload::SessionEnded {
                mode: SessionMode::Scan,
                outcome: SessionOutcome::Completed
            })
            .is_none()
        );
    }

    #[test]
    fn describe_includes_payload_values() {
        colored::control::set_override(false);
        let line = describe(&EventPayload::Sample(ScanSample::new(85.0, 1.5))).unwrap();
        assert!(line.contains("85.0°"));
        assert!(line.contains("1.50 m"));

        let line = describe(&EventPayload::Warning(WarningEvent {
            message: "Cliff left".to_string(),
        }))
        .unwrap();
        assert!(line.contains("Cliff left"));

        let line = describe(&EventPayload::Fault(FaultReport::new(
            FaultKind::Parse,
            "bad DIS",
        )))
        .unwrap();
        assert!(line.contains("fault"));
        assert!(line.contains("bad DIS"));
    }
}
