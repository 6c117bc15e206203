//! dv-auction - Binary Entry Point
//!
//! Runs a short scripted auction against the in-memory escrow and prints
//! what happened. Set `RUST_LOG=dv_auction=debug` to see tree-level logs.

use dv_auction::config::{AuctionConfig, Roles};
use dv_auction::engine::{AuctionEngine, CallContext, EngineError, InMemoryEscrow};
use dv_auction::types::units::wei_to_ether;
use dv_auction::types::{Address, AuctionEvent, AuctionType, Wei};
use tracing_subscriber::EnvFilter;

fn ether(wei: Wei) -> String {
    wei_to_ether(wei).unwrap_or_else(|| format!("{} wei", wei))
}

fn run() -> Result<(), EngineError> {
    let roles = Roles {
        owner: Address::from_low_u64(1),
        vault_manager: Address::from_low_u64(2),
        rewards: Address::from_low_u64(3),
    };
    let mut engine = AuctionEngine::new(AuctionConfig::default(), roles, InMemoryEscrow::new())?;
    let owner = CallContext::new(roles.owner);

    println!("Placing bids...");
    for n in 0..9u64 {
        let op = Address::from_low_u64(100 + n);
        if n % 3 != 0 {
            engine.add_to_whitelist(&owner, op)?;
        }

        let auction_type = if n < 5 { AuctionType::Dv4 } else { AuctionType::Dv7 };
        let discount = (n as u16) * 100;
        let days = 30 + (n as u32) * 15;

        let price = engine.get_price_to_pay(&op, discount, days, auction_type.to_u8())?;
        let ctx = CallContext::new(op).with_value(price).at(1_700_000_000 + n);
        let bid_id = engine.bid(&ctx, discount, days, auction_type.to_u8())?;

        let bid = engine.bid_record(bid_id).ok_or(EngineError::BidNotFound(bid_id))?;
        println!(
            "  {} {:?} by {}: {} days, discount {} bps, paid {} ETH, score {}",
            bid_id,
            auction_type,
            op,
            days,
            discount,
            ether(price),
            bid.score
        );
    }
    println!();

    for auction_type in AuctionType::ALL {
        let sub = engine.sub_auction(auction_type);
        print!(
            "{:?}: {} bids from {} operators",
            auction_type,
            sub.bid_count(),
            sub.num_operators()
        );
        match engine.virtual_cluster(auction_type) {
            Some(vc) => println!(", virtual cluster {} at {}", vc.id, vc.average_score),
            None => println!(", not enough bids for a cluster"),
        }
    }
    println!(
        "Main auction holds {} cluster(s)",
        engine.num_clusters_in_main_auction()
    );
    println!();

    let vault = CallContext::new(roles.vault_manager).at(1_700_001_000);
    let cluster_id = engine.trigger_auction(&vault)?;
    println!("Drew cluster {}", cluster_id);
    println!(
        "Vault received {} ETH",
        ether(engine.escrow().paid_to(&roles.vault_manager))
    );
    println!();

    println!("Events:");
    for event in engine.take_events() {
        match event {
            AuctionEvent::ClusterCreated {
                cluster_id,
                average_score,
                ..
            } => println!("  ClusterCreated {} (average {})", cluster_id, average_score),
            AuctionEvent::NodeOpJoinedCluster { node_op, bid_id, .. } => {
                println!("  NodeOpJoinedCluster {} ({})", node_op, bid_id)
            }
            other => println!("  {}", other.name()),
        }
    }
    println!();

    println!("State root: 0x{}", hex::encode(engine.state_root()?));
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    println!("===========================================");
    println!("  dv-auction - validator cluster auction");
    println!("===========================================");
    println!();

    if let Err(e) = run() {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
