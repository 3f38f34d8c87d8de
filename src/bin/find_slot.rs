//! Prints the first slot every given person is free for
//!
//! Usage: `find_slot <free/busy URL template> <duration in minutes> <email>...`

use chrono::{Duration, DurationRound, Utc};

use rendezvous::client::Client;
use rendezvous::freebusy_manager::FreeBusyManager;
use rendezvous::resource::Resource;
use rendezvous::slot_finder::{SlotFinder, SlotSearch, TimeSlot};

const USAGE: &str = "usage: find_slot <free/busy URL template> <duration in minutes> <email>...";

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }
    let minutes: i64 = match args[1].parse() {
        Ok(m) if m > 0 => m,
        _ => {
            eprintln!("invalid duration {:?}\n{}", args[1], USAGE);
            std::process::exit(2);
        },
    };
    let emails = &args[2..];

    let manager = FreeBusyManager::new(Client::new(Resource::new(&args[0], "", "")));
    let free_busys = manager.fetch_all(emails).await;
    for (email, fb) in emails.iter().zip(&free_busys) {
        if fb.is_none() {
            println!("  (no free/busy information for {}, assuming free)", email);
        }
    }

    let now = Utc::now();
    let start = now.duration_trunc(Duration::minutes(15)).unwrap_or(now) + Duration::minutes(15);
    let proposed = TimeSlot::new(start, start + Duration::minutes(minutes));
    let attendees: Vec<_> = free_busys.iter().map(|fb| fb.as_ref()).collect();

    match SlotFinder::new().find(proposed, &attendees, now) {
        SlotSearch::Found(slot) => println!("{} - {}", slot.start, slot.end),
        SlotSearch::NoFreeSlot { horizon } => println!("Nobody is free before {}", horizon),
    }
}
