pub mod kube_contexts;
pub mod kube_watch;
pub mod mattermost;

pub use kube_contexts::{resolve_clients, select_contexts, ClusterClient};
pub use kube_watch::{spawn_watchers, ApiPath, KubeWatchSource, StreamEnd, WatchConnection, WatchSource};
pub use mattermost::{notifier_from_config, MattermostNotifier};
