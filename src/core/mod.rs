// ─── Instancer Core ───
// Instance lifecycle engine for a moddable Minecraft launcher.
//
// Architecture:
//   core/
//     instance/   — Instance model, on-disk manager, materialize/launch orchestration
//     version/    — Mojang manifest, version JSON + OS rules, distribution service
//     downloader/ — Concurrent SHA-1 validated downloads + progress coordinator
//     assets/     — Asset index → object files
//     loaders/    — Forge installer, discovery, merge, version index
//     launch/     — Classpath builder + process spawner
//     java/       — Mojang runtime catalog + per-instance runtime paths
//     auth/       — Sessions and the offline authenticator
//     state/      — Settings and wiring

pub mod assets;
pub mod auth;
pub mod downloader;
pub mod error;
pub mod http;
pub mod instance;
pub mod java;
pub mod launch;
pub mod loaders;
pub mod state;
pub mod version;
