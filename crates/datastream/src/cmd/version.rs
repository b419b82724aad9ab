use datastream_frame::MAX_FRAME_SIZE;
use datastream_peer::{Peer, BUILD_DATE};
use datastream_transport::MemoryStream;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("datastream {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: datastream");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("build_date: {BUILD_DATE}");
    println!(
        "target: {}",
        option_env!("DATASTREAM_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("DATASTREAM_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("max_frame_size: {MAX_FRAME_SIZE}");
    println!(
        "supported_features: {:#06x}",
        Peer::<MemoryStream>::supported_features()
    );
    println!(
        "features: peer={}, async={}, cli=true",
        cfg!(feature = "peer"),
        cfg!(feature = "async")
    );

    Ok(SUCCESS)
}
