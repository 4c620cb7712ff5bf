//! Content publishing command implementation for µDCN CLI
//!
//! Seeding content is a management-surface operation (§6.4
//! `newcontent`) against an already-running node, not a standalone process
//! of its own — the node's Content Store and FIB are what actually serve
//! Interests.

use anyhow::Result;
use log::info;

use crate::utils::{mgmt_request, percent_encode};

pub async fn publish_content(name_str: String, content: String, management: String) -> Result<()> {
    info!(
        "Publishing content: name={}, content_len={}, management={}",
        name_str,
        content.len(),
        management
    );

    println!("Seeding content on {management}:");
    println!("  Name: {name_str}");
    println!(
        "  Content ({}): {}",
        content.len(),
        if content.len() > 32 {
            format!("{}...", &content[..30])
        } else {
            content.clone()
        }
    );

    let path = format!(
        "icnlayer/newcontent/{}:{}",
        percent_encode(&name_str),
        percent_encode(&content)
    );
    let response = mgmt_request(&management, &path).await?;
    println!("  {response}");

    Ok(())
}
