//! Race Judge
//!
//! Course checker: loads a course document, reports what it contains and
//! prints it back in normalized form. Exits with code 1 if the course is
//! unusable.

use anyhow::Context;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use race_judge::{Course, LineSegment, Point, VERSION};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("Race Judge v{}", VERSION);

    let path = std::env::args()
        .nth(1)
        .context("usage: race-judge <course.json>")?;

    let course = match Course::load(&path) {
        Ok(course) => course,
        Err(e) => {
            error!("{}: {}", path, e);
            std::process::exit(1);
        }
    };

    info!("Course {}: {}x{}", path, course.width, course.length);
    info!("Vision: {} rows, think time: {} ms, step limit: {}", course.vision, course.think_time, course.step_limit);
    info!("Start columns: {} / {}", course.start_x[0], course.start_x[1]);
    info!("Obstacles: {} cells", course.obstacles().blocked_count());

    for (player, &x) in course.start_x.iter().enumerate() {
        let start = Point::new(x, 0);
        if course.is_blocked(start) {
            error!("player {} starts on an obstacle at {}", player, start);
        }
        // Straight run to the far edge, as a quick sanity check of the layout
        let run = LineSegment::new(start, Point::new(x, course.length - 1));
        if course.collides(&run) {
            info!("player {}: straight run from {} is blocked", player, start);
        }
    }

    println!("{}", course.to_json());
    Ok(())
}
