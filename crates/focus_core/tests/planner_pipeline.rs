use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};

use focus_core::layout::{self, DragSelect, SlotRange};
use focus_core::schedule::{EventColor, Recurrence, Schedule, ScheduleDraft};
use focus_core::stats::{self, Achievement, CompletionStats};
use focus_core::timer::{FocusSession, Phase, SessionCycle};
use focus_core::todo::{Priority, Todo};
use focus_core::window::{plan_window, ViewMode};
use focus_core::FocusConfig;

fn date(s: &str) -> NaiveDate {
    s.parse().expect("date")
}

fn when(s: &str) -> NaiveDateTime {
    s.parse().expect("datetime")
}

fn event(id: &str, title: &str, recurrence: Recurrence, start: &str, end: &str) -> Schedule {
    Schedule {
        id: id.into(),
        owner_id: "owner-1".into(),
        title: title.into(),
        description: None,
        start_time: when(start),
        end_time: when(end),
        color: EventColor::default(),
        recurrence,
        recurrence_end: None,
        excluded_dates: Vec::new(),
        created_at: None,
        updated_at: None,
    }
}

fn week_calendar() -> Vec<Schedule> {
    let mut gym = event(
        "gym",
        "Gym",
        Recurrence::Weekdays,
        "2024-02-01T18:00:00",
        "2024-02-01T19:00:00",
    );
    gym.excluded_dates.push("2024-03-06".into());
    vec![
        event(
            "standup",
            "Standup",
            Recurrence::Weekly,
            "2024-01-08T09:00:00",
            "2024-01-08T09:30:00",
        ),
        gym,
        event(
            "pill",
            "Take pill",
            Recurrence::None,
            "2024-03-05T07:00:00",
            "2024-03-05T07:10:00",
        ),
        event(
            "dentist",
            "Dentist",
            Recurrence::None,
            "2024-03-07T14:00:00",
            "2024-03-07T15:00:00",
        ),
        event(
            "retro",
            "February retro",
            Recurrence::None,
            "2024-02-20T10:00:00",
            "2024-02-20T11:00:00",
        ),
    ]
}

#[test]
fn a_week_of_meetings_expands_sorts_and_lays_out() {
    let schedules = week_calendar();
    // 2024-03-06 is a Wednesday; the Monday week runs Mar 4 to Mar 10.
    let plan = plan_window(&schedules, date("2024-03-06"), ViewMode::Week, Weekday::Mon);
    assert_eq!(plan.window.start, date("2024-03-04"));
    assert_eq!(plan.window.end, date("2024-03-11"));

    let starts: Vec<String> = plan
        .occurrences
        .iter()
        .map(|occurrence| occurrence.start.format("%m-%d %H:%M").to_string())
        .collect();
    assert_eq!(
        starts,
        vec![
            "03-04 09:00", // standup, weekly from a January Monday
            "03-04 18:00", // gym
            "03-05 07:00", // pill, plain one-off
            "03-05 18:00", // gym
            "03-07 14:00", // dentist
            "03-07 18:00", // gym, Wednesday excluded
            "03-08 18:00", // gym
        ]
    );
    let gym_monday = &plan.occurrences[1];
    assert_eq!(gym_monday.id, "gym@2024-03-04T18:00");
    assert_eq!(gym_monday.schedule_id, "gym");
    assert!(gym_monday.derived);
    assert!(
        !plan.occurrences.iter().any(|o| o.title == "February retro"),
        "one-offs outside the window stay out"
    );

    let blocks = layout::layout(&plan.occurrences, plan.window);
    assert_eq!(blocks.len(), plan.occurrences.len());
    let standup = &blocks[0];
    assert_eq!((standup.day, standup.top_min), (0, 9 * 60));
    assert_eq!(standup.span_min, 30);
    let pill = &blocks[2];
    assert_eq!((pill.day, pill.span_min), (1, 10));
    assert_eq!(pill.height_min, 20, "short events keep a clickable height");
    let friday_gym = blocks.last().expect("friday gym");
    assert_eq!((friday_gym.day, friday_gym.top_min), (4, 18 * 60));

    // The excluded Wednesday leaves the day view empty.
    let wednesday = plan_window(&schedules, date("2024-03-06"), ViewMode::Day, Weekday::Mon);
    assert!(wednesday.occurrences.is_empty());
}

#[test]
fn a_drag_on_the_grid_becomes_a_valid_draft() {
    let schedules = week_calendar();
    let plan = plan_window(&schedules, date("2024-03-06"), ViewMode::Week, Weekday::Mon);

    let mut drag = DragSelect::new();
    drag.pointer_down(2, 10, 7); // snaps to 10:00
    drag.pointer_move(2, 11, 52); // snaps to 11:45
    assert!(drag.is_dragging());
    let slot = drag.pointer_up().expect("completed drag");
    assert_eq!(
        slot,
        SlotRange {
            day: 2,
            start_min: 10 * 60,
            end_min: 11 * 60 + 45,
        }
    );

    let (start, end) = slot.resolve(plan.window).expect("inside window");
    assert_eq!(start, when("2024-03-06T10:00:00"));
    assert_eq!(end, when("2024-03-06T11:45:00"));
    let draft = ScheduleDraft::new("Deep work", start, end);
    draft.validate().expect("draft from drag is valid");

    // A click without movement still yields a one-hour slot.
    drag.pointer_down(4, 9, 3);
    let click = drag.pointer_up().expect("zero-span click");
    assert_eq!(
        click,
        SlotRange {
            day: 4,
            start_min: 9 * 60,
            end_min: 10 * 60,
        }
    );

    // Leaving the grid abandons the selection without a slot.
    drag.pointer_down(1, 8, 0);
    drag.pointer_leave();
    assert!(!drag.is_dragging());
    assert!(drag.pointer_up().is_none());
}

#[test]
fn a_focus_day_feeds_stats_and_achievements() {
    let config = FocusConfig::default();
    let mut cycle = SessionCycle::new();
    let mut todo = Todo {
        id: "todo-1".into(),
        owner_id: "owner-1".into(),
        title: "Write report".into(),
        description: None,
        completed: false,
        priority: Priority::High,
        due_date: Some(date("2024-03-08")),
        total_time_spent: 0,
        session_count: 0,
        last_worked_at: None,
        created_at: None,
        updated_at: None,
    };

    let morning = Utc.from_utc_datetime(&when("2024-03-06T09:00:00"));
    let mut session = cycle.session_for(Phase::Focus, &config, Some(todo.id.clone()));
    assert_eq!(session.target_seconds, 25 * 60);
    session.start(morning);
    let outcome = session.finish(morning + chrono::Duration::minutes(25));
    assert!(outcome.completed);
    todo.record_focus(outcome.seconds, morning + chrono::Duration::minutes(25));

    assert_eq!(cycle.advance(outcome.phase, &config), Phase::ShortBreak);
    assert_eq!(todo.total_time_spent, 1500);
    assert_eq!(todo.session_count, 1);

    let second = {
        let mut s = FocusSession::focus(Some(todo.id.clone()));
        s.start(morning + chrono::Duration::hours(1));
        s.finish(morning + chrono::Duration::hours(1) + chrono::Duration::minutes(10))
    };
    assert!(!second.completed, "cut short at ten minutes");
    todo.record_focus(second.seconds, morning + chrono::Duration::hours(2));

    let todos = vec![todo];
    let completion = CompletionStats::of(&todos);
    assert_eq!(completion.rate_percent, 0);
    let today = date("2024-03-06");
    let heatmap = stats::activity_heatmap(&todos, today, 7);
    assert_eq!(heatmap.len(), 7);
    assert_eq!(heatmap[6].seconds, 1500 + 600);
    assert_eq!(stats::activity_streak(&todos, today), 1);
    assert_eq!(
        stats::achievements(&todos, today),
        vec![Achievement::FirstSession]
    );
}
