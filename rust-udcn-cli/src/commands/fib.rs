//! FIB command implementation for µDCN CLI
//!
//! Talks to a running node's management surface (§6.4) rather than holding
//! its own FIB — there is nothing else to manage against outside of a node
//! that's actually forwarding traffic.

use anyhow::Result;
use log::info;

use crate::utils::{mgmt_request, percent_encode};
use crate::FibCommands;

pub async fn handle_command(cmd: FibCommands) -> Result<()> {
    match cmd {
        FibCommands::Add { prefix, face, cost, management } => add_route(prefix, face, cost, management).await,
        FibCommands::Remove { prefix, management } => remove_route(prefix, management).await,
        FibCommands::Show { management } => show_routes(management).await,
    }
}

async fn add_route(prefix: String, face: u32, cost: u8, management: String) -> Result<()> {
    info!("Adding route: prefix={}, face={}, cost={}", prefix, face, cost);

    let path = format!(
        "icnlayer/newforwardingrule/{}:{};cost={}",
        percent_encode(&prefix),
        face,
        cost
    );
    mgmt_request(&management, &path).await?;

    println!("Added route: {prefix} -> face {face} (cost {cost})");
    Ok(())
}

async fn remove_route(prefix: String, management: String) -> Result<()> {
    info!("Removing route: prefix={}", prefix);

    let path = format!("icnlayer/removeforwardingrule/{}", percent_encode(&prefix));
    mgmt_request(&management, &path).await?;

    println!("Removed route: {prefix}");
    Ok(())
}

async fn show_routes(management: String) -> Result<()> {
    info!("Showing all routes in FIB at {}", management);

    let dump = mgmt_request(&management, "icnlayer/fib").await?;
    // Body is `FIB OK:<name>:<faces>:<cost>;<name>:<faces>:<cost>;...`
    let Some((_, entries)) = dump.split_once(':') else {
        println!("No routes.");
        return Ok(());
    };

    println!("{:<30} {:<20} {:>6}", "PREFIX", "FACES", "COST");
    for entry in entries.split(';').filter(|e| !e.is_empty()) {
        let mut fields = entry.rsplitn(3, ':');
        let cost = fields.next().unwrap_or("0");
        let faces = fields.next().unwrap_or("");
        let name = fields.next().unwrap_or(entry);
        println!("{name:<30} {faces:<20} {cost:>6}");
    }

    Ok(())
}
