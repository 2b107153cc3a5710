//! Requests the host sends to its backend collaborators and the responses it
//! later receives.
//!
//! Sending never blocks: a [`Transport`] only queues the request. Whoever
//! drives the host feeds responses back as runtime events, tagged with the
//! request id they answer. A request that fails in transit simply never gets
//! a response.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::CanvasConfig;
use crate::gadget::GroupSpec;
use crate::loader::AssetManifest;

pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendRequest {
    FetchGroup {
        request_id: RequestId,
        group_name: String,
        owner_id: Option<String>,
    },
    MoveGadget {
        request_id: RequestId,
        group_name: String,
        gadget_instance_id: String,
        column: usize,
        order: usize,
        version: u64,
    },
    RemoveGadget {
        request_id: RequestId,
        group_name: String,
        gadget_id: String,
    },
    ResolveDependencies {
        request_id: RequestId,
        endpoint: String,
        files: Vec<String>,
    },
}

impl BackendRequest {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::FetchGroup { request_id, .. }
            | Self::MoveGadget { request_id, .. }
            | Self::RemoveGadget { request_id, .. }
            | Self::ResolveDependencies { request_id, .. } => *request_id,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::FetchGroup { .. } => "getGadgetGroup.do",
            Self::MoveGadget { .. } => "moveGadget.do",
            Self::RemoveGadget { .. } => "removeApplicationFromGroup.do",
            Self::ResolveDependencies { .. } => "resolveDependencies.do",
        }
    }

    /// Absolute url the request is sent to, query included. Dependency
    /// resolution carries its own endpoint; the rest live under the gadget
    /// container module.
    pub fn url(&self, config: &CanvasConfig) -> String {
        let base = match self {
            Self::ResolveDependencies { endpoint, .. } => endpoint.clone(),
            other => config.endpoint(other.action()),
        };
        format!("{}?{}", base, self.to_query())
    }

    /// Query string in the shape the backend endpoints expect. Dependency
    /// resolution repeats the `files` key once per file.
    pub fn to_query(&self) -> String {
        let pairs: Vec<(&str, String)> = match self {
            Self::FetchGroup {
                group_name,
                owner_id,
                ..
            } => {
                let mut pairs = vec![("groupName", group_name.clone())];
                if let Some(owner) = owner_id {
                    pairs.push(("ownerId", owner.clone()));
                }
                pairs
            }
            Self::MoveGadget {
                group_name,
                gadget_instance_id,
                column,
                order,
                ..
            } => vec![
                ("groupName", group_name.clone()),
                ("gadgetInstanceId", gadget_instance_id.clone()),
                ("column", column.to_string()),
                ("order", order.to_string()),
            ],
            Self::RemoveGadget {
                group_name,
                gadget_id,
                ..
            } => vec![
                ("groupName", group_name.clone()),
                ("gadgetId", gadget_id.clone()),
            ],
            Self::ResolveDependencies { files, .. } => {
                files.iter().map(|file| ("files", file.clone())).collect()
            }
        };
        pairs
            .into_iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(&value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Move and remove acknowledgements carry no data the host relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendResponse {
    GroupFetched {
        request_id: RequestId,
        group: GroupSpec,
    },
    MoveAcknowledged {
        request_id: RequestId,
        #[serde(default)]
        ack: Acknowledgement,
    },
    RemoveAcknowledged {
        request_id: RequestId,
        #[serde(default)]
        ack: Acknowledgement,
    },
    DependenciesResolved {
        request_id: RequestId,
        manifest: AssetManifest,
    },
}

impl BackendResponse {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::GroupFetched { request_id, .. }
            | Self::MoveAcknowledged { request_id, .. }
            | Self::RemoveAcknowledged { request_id, .. }
            | Self::DependenciesResolved { request_id, .. } => *request_id,
        }
    }

    pub fn from_json_str(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Outbound half of the backend connection.
pub trait Transport {
    fn send(&mut self, request: BackendRequest);
}

/// Queues requests in memory until the driver drains them. Clones share the
/// same queue, so a driver can keep one handle while components hold others.
#[derive(Debug, Clone, Default)]
pub struct OutboxTransport {
    queue: Rc<RefCell<VecDeque<BackendRequest>>>,
}

impl OutboxTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<BackendRequest> {
        self.queue.borrow_mut().drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn last(&self) -> Option<BackendRequest> {
        self.queue.borrow().back().cloned()
    }
}

impl Transport for OutboxTransport {
    fn send(&mut self, request: BackendRequest) {
        self.queue.borrow_mut().push_back(request);
    }
}

/// Hands out request ids, starting at 1.
#[derive(Debug, Default)]
pub struct RequestIds {
    last: RequestId,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> RequestId {
        self.last += 1;
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_query_matches_endpoint_shape() {
        let request = BackendRequest::MoveGadget {
            request_id: 3,
            group_name: "main".into(),
            gadget_instance_id: "12".into(),
            column: 1,
            order: 0,
            version: 4,
        };
        assert_eq!(request.action(), "moveGadget.do");
        assert_eq!(
            request.to_query(),
            "groupName=main&gadgetInstanceId=12&column=1&order=0"
        );
    }

    #[test]
    fn urls_live_under_the_configured_host() {
        let config = CanvasConfig::for_host("http://example.org", "/portal");
        let remove = BackendRequest::RemoveGadget {
            request_id: 1,
            group_name: "main".into(),
            gadget_id: "4".into(),
        };
        assert_eq!(
            remove.url(&config),
            "http://example.org/portal/module/gadgetcontainer/\
             removeApplicationFromGroup.do?groupName=main&gadgetId=4"
        );

        let resolve = BackendRequest::ResolveDependencies {
            request_id: 2,
            endpoint: "/portal/module/jsmodule/action/resolveDependencies.do".into(),
            files: vec!["/a.js".into()],
        };
        assert_eq!(
            resolve.url(&config),
            "/portal/module/jsmodule/action/resolveDependencies.do?files=%2Fa.js"
        );
    }

    #[test]
    fn fetch_query_includes_owner_only_when_given() {
        let without = BackendRequest::FetchGroup {
            request_id: 1,
            group_name: "main".into(),
            owner_id: None,
        };
        let with = BackendRequest::FetchGroup {
            request_id: 2,
            group_name: "main".into(),
            owner_id: Some("5".into()),
        };
        assert_eq!(without.to_query(), "groupName=main");
        assert_eq!(with.to_query(), "groupName=main&ownerId=5");
    }

    #[test]
    fn resolve_query_repeats_files_key() {
        let request = BackendRequest::ResolveDependencies {
            request_id: 1,
            endpoint: "/module/jsmodule/action/resolveDependencies.do".into(),
            files: vec!["/a.js".into(), "/b.js".into()],
        };
        assert_eq!(request.to_query(), "files=%2Fa.js&files=%2Fb.js");
    }

    #[test]
    fn outbox_clones_share_queue() {
        let outbox = OutboxTransport::new();
        let mut handle = outbox.clone();
        handle.send(BackendRequest::RemoveGadget {
            request_id: 9,
            group_name: "main".into(),
            gadget_id: "1".into(),
        });

        assert_eq!(outbox.pending(), 1);
        assert_eq!(outbox.drain()[0].request_id(), 9);
        assert_eq!(outbox.pending(), 0);
    }

    #[test]
    fn responses_parse_from_json() {
        let raw = r#"{"kind": "dependencies_resolved", "request_id": 4,
                      "manifest": {"js": ["/a.js", "/b.js"]}}"#;
        let response = BackendResponse::from_json_str(raw).unwrap();
        assert_eq!(response.request_id(), 4);
        match response {
            BackendResponse::DependenciesResolved { manifest, .. } => {
                assert_eq!(manifest.files(), &["/a.js".to_string(), "/b.js".to_string()]);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }
}
