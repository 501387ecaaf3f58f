//! Screen tree of the field-service bot

use oracle_menu::{Button, MenuError, MenuRegistry, Permission, ScreenDefinition, ScreenId};

use crate::actions::BotAction;

pub const MAIN: ScreenId = ScreenId::from_static("main");
pub const TASKS: ScreenId = ScreenId::from_static("tasks");
pub const PROFILE: ScreenId = ScreenId::from_static("profile");
pub const STATS: ScreenId = ScreenId::from_static("stats");
pub const MORE: ScreenId = ScreenId::from_static("more");
pub const ADMIN: ScreenId = ScreenId::from_static("admin");
pub const NEAR_TASKS: ScreenId = ScreenId::from_static("near_tasks");

pub fn declare() -> Result<MenuRegistry, MenuError> {
    MenuRegistry::builder(MAIN)
        .register(
            ScreenDefinition::new(MAIN)
                .layout([1, 1])
                .button(Button::screen("menu.tasks", TASKS).icon("📋"))
                .button(Button::screen("menu.profile", PROFILE))
                .button(Button::screen("menu.more", MORE))
                .button(Button::action("menu.logout", BotAction::Logout.id())),
        )?
        .register(
            ScreenDefinition::new(TASKS)
                .title("tasks.title")
                .layout([1, 1])
                .with_back()
                .button(Button::action("menu.active_tasks", BotAction::ActiveTasks.id()))
                .button(Button::action("menu.tasks_near", BotAction::NearTasks.id())),
        )?
        .register(
            ScreenDefinition::new(PROFILE)
                .title("profile.title")
                .layout([1, 1, 1])
                .with_back()
                .button(Button::action("menu.about_me", BotAction::AboutMe.id()))
                .button(Button::screen("menu.my_statistic", STATS))
                .button(Button::action("menu.create_report", BotAction::CreateReport.id())),
        )?
        .register(
            ScreenDefinition::new(STATS)
                .title("statistic.title")
                .layout([1, 1, 1])
                .with_back()
                .button(Button::action("menu.today", BotAction::StatisticToday.id()))
                .button(Button::action("menu.this_month", BotAction::StatisticMonth.id()))
                .button(Button::action("menu.this_year", BotAction::StatisticYear.id())),
        )?
        .register(
            ScreenDefinition::new(MORE)
                .title("more.title")
                .layout([1, 1, 1])
                .with_back()
                .button(Button::action("menu.language", BotAction::Language.id()).icon("🌐"))
                .button(Button::action("menu.report_issue", BotAction::ReportIssue.id()))
                .button(Button::screen("menu.admin_panel", ADMIN).requires(Permission::Admin)),
        )?
        .register(
            ScreenDefinition::new(ADMIN)
                .title("admin.panel.title")
                .layout([1, 1, 1])
                .with_back()
                .button(Button::action("menu.broadcast", BotAction::Broadcast.id()))
                .button(Button::action("menu.geocoding_issues", BotAction::GeocodingIssues.id()))
                .button(Button::action("menu.geocoding_reset", BotAction::GeocodingReset.id())),
        )?
        .register(
            ScreenDefinition::new(NEAR_TASKS)
                .layout([1])
                .with_back()
                .button(
                    Button::action("menu.send_location", BotAction::NearTasksLocation.id())
                        .location_prompt(),
                ),
        )?
        .build()
}
