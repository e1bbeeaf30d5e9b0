use crate::commands::{prepare, CommandResult, EXIT_DATABASE, EXIT_MIGRATION};
use medvoice_db::seed::{DEMO_ORGANIZATION_ID, DEMO_USER_ID};
use medvoice_db::{connect_with_config, migrations, seed_demo, SeedSummary};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

        let seeded = seed_demo(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_DATABASE));

        pool.close().await;
        seeded
    });

    match result {
        Ok(summary) => CommandResult::success("seed", describe(&summary)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn describe(summary: &SeedSummary) -> String {
    let state = |created: bool| if created { "created" } else { "already present" };
    format!(
        "demo data ready: organization `{DEMO_ORGANIZATION_ID}` {}, user `{DEMO_USER_ID}` {}, \
         {} agents created, {} already present",
        state(summary.organization_created),
        state(summary.user_created),
        summary.agents_created,
        summary.agents_existing,
    )
}

#[cfg(test)]
mod tests {
    use medvoice_db::SeedSummary;

    use super::describe;

    #[test]
    fn description_reports_created_and_existing_rows() {
        let first = SeedSummary {
            organization_created: true,
            user_created: true,
            agents_created: 3,
            agents_existing: 0,
        };
        assert_eq!(
            describe(&first),
            "demo data ready: organization `org-default` created, user `user-demo-operator` created, \
             3 agents created, 0 already present"
        );

        let rerun = SeedSummary { agents_existing: 3, ..SeedSummary::default() };
        assert!(describe(&rerun).contains("`org-default` already present"));
        assert!(describe(&rerun).ends_with("0 agents created, 3 already present"));
    }
}
