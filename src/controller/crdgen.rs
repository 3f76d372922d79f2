//! # CRD Generator
//!
//! Prints the GameDefinition and SteamServer CustomResourceDefinitions as a
//! multi-document YAML stream.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/boilerr.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use boilerr_controller::crd::{GameDefinition, SteamServer};
use kube::core::CustomResourceExt;

fn main() {
    let crds = [GameDefinition::crd(), SteamServer::crd()];

    println!("# This file is auto-generated by crdgen");
    println!("# DO NOT EDIT THIS FILE MANUALLY");
    println!("# Change the types under src/crd/ and regenerate instead");
    for crd in &crds {
        match serde_yaml::to_string(crd) {
            Ok(yaml) => {
                println!("---");
                print!("{yaml}");
            }
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
