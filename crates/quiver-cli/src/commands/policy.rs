//! policy command - get, set or remove bucket policies

use super::CommandContext;
use crate::s3_client::ObjectUri;
use crate::PolicyAction;
use anyhow::{Context, Result};
use colored::Colorize;
use std::io::Read;

pub async fn execute(ctx: &CommandContext, action: PolicyAction) -> Result<()> {
    let client = ctx.client()?;

    match action {
        PolicyAction::Get { bucket } => {
            let bucket = ObjectUri::bucket_name(&bucket)?;
            let policy = client
                .get_bucket_policy(&bucket)
                .await
                .context("Failed to get bucket policy")?;

            if policy.is_empty() {
                ctx.info(&format!("No policy set on s3://{}", bucket));
            } else if ctx.is_json() {
                let document: serde_json::Value = serde_json::from_str(&policy)?;
                ctx.print_json(&document)?;
            } else {
                println!("{}", policy);
            }
        }
        PolicyAction::Set { bucket, file } => {
            let bucket = ObjectUri::bucket_name(&bucket)?;
            let policy = read_policy(&file)?;
            client
                .set_bucket_policy(&bucket, &policy)
                .await
                .context("Failed to set bucket policy")?;
            ctx.info(&format!("{}: s3://{}", "set_policy".green(), bucket));
        }
        PolicyAction::Remove { bucket } => {
            let bucket = ObjectUri::bucket_name(&bucket)?;
            client
                .set_bucket_policy(&bucket, "")
                .await
                .context("Failed to remove bucket policy")?;
            ctx.info(&format!("{}: s3://{}", "remove_policy".red(), bucket));
        }
    }

    Ok(())
}

fn read_policy(file: &str) -> Result<String> {
    if file == "-" {
        let mut policy = String::new();
        std::io::stdin().read_to_string(&mut policy)?;
        return Ok(policy);
    }
    std::fs::read_to_string(file).with_context(|| format!("Failed to read policy file: {}", file))
}
