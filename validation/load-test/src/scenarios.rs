//! Built-in workflow for the PR reviewer assignment service.

use crate::error::WorkflowError;
use crate::step::{RequestTemplate, Step};
use crate::workflow::{SeedSpec, Workflow};
use serde_json::json;

/// Step names of [`review_workflow`], in execution order.
pub const REVIEW_STEPS: [&str; 6] = [
    "create-team",
    "activate-user",
    "create-pr",
    "merge-pr",
    "get-team",
    "get-user-reviews",
];

/// Create a team with three members, activate the author, open and merge a
/// pull request, then read back the team and the author's review list.
///
/// Later steps use values extracted from earlier responses, so a failed
/// create shows up as build failures downstream.
pub fn review_workflow() -> Result<Workflow, WorkflowError> {
    let seeds = vec![
        SeedSpec::new("team_name", "team"),
        SeedSpec::new("author_id", "u"),
        SeedSpec::new("member_bob", "u"),
        SeedSpec::new("member_dana", "u"),
        SeedSpec::new("pr_id", "pr"),
        SeedSpec::new("pr_title", "PR"),
    ];

    let steps = vec![
        Step::new(
            "create-team",
            RequestTemplate::post("/team/add").json(json!({
                "team_name": "{team_name}",
                "members": [
                    { "user_id": "{author_id}", "username": "Alice", "is_active": false },
                    { "user_id": "{member_bob}", "username": "Bob", "is_active": true },
                    { "user_id": "{member_dana}", "username": "Dana", "is_active": true }
                ]
            })),
        )
        .expect_status(201)
        .extract("created_team", "/team_name"),
        Step::new(
            "activate-user",
            RequestTemplate::post("/users/setIsActive").json(json!({
                "user_id": "{author_id}",
                "is_active": true
            })),
        )
        .expect_status(200)
        .extract("active_user", "/user/user_id"),
        Step::new(
            "create-pr",
            RequestTemplate::post("/pullRequest/create").json(json!({
                "pull_request_id": "{pr_id}",
                "pull_request_name": "{pr_title}",
                "author_id": "{active_user}"
            })),
        )
        .expect_status(201)
        .extract("created_pr", "/pull_request_id"),
        Step::new(
            "merge-pr",
            RequestTemplate::post("/pullRequest/merge").json(json!({
                "pull_request_id": "{created_pr}"
            })),
        )
        .expect_status(200),
        Step::new(
            "get-team",
            RequestTemplate::get("/team/get").query("team_name", "{created_team}"),
        )
        .expect_status(200),
        Step::new(
            "get-user-reviews",
            RequestTemplate::get("/users/getReview").query("user_id", "{active_user}"),
        )
        .expect_status(200),
    ];

    Workflow::new("pr-review", seeds, steps)
}
