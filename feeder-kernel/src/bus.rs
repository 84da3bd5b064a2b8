/*!
 * BUS - Sinks publiés sur MQTT pour le dashboard
 *
 * Chaque notification du moteur devient un message JSON sous `{prefix}/...` :
 * render/node@v1, render/edge@v1, render/marker@v1, chart/sample@v1, alerts@v1.
 * Publication par `try_publish` (QoS 0) : jamais d'attente dans la transition,
 * un message perdu est seulement loggué.
 */

use rumqttc::{AsyncClient, QoS};
use serde::Serialize;
use serde_json::json;

use crate::series::Series;
use crate::sinks::{AlertSink, ChartSink, NodeStyleOpts, Renderer};
use crate::topology::{EdgeId, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusTopics {
    pub node_style: String,
    pub edge_style: String,
    pub marker: String,
    pub sample: String,
    pub alert: String,
}

impl BusTopics {
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            node_style: format!("{prefix}/render/node@v1"),
            edge_style: format!("{prefix}/render/edge@v1"),
            marker: format!("{prefix}/render/marker@v1"),
            sample: format!("{prefix}/chart/sample@v1"),
            alert: format!("{prefix}/alerts@v1"),
        }
    }
}

pub struct BusSink {
    client: AsyncClient,
    topics: BusTopics,
}

impl BusSink {
    pub fn new(client: AsyncClient, prefix: &str) -> Self {
        Self { client, topics: BusTopics::new(prefix) }
    }

    fn publish(&self, topic: &str, body: impl Serialize) {
        let payload = match serde_json::to_vec(&body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(topic, error = %e, "cannot serialize bus notification");
                return;
            }
        };
        if let Err(e) = self.client.try_publish(topic, QoS::AtMostOnce, false, payload) {
            tracing::warn!(topic, error = %e, "bus notification dropped");
        }
    }
}

impl Renderer for BusSink {
    fn set_node_style(&self, node: NodeId, color: &str, opts: NodeStyleOpts) {
        self.publish(
            &self.topics.node_style,
            json!({
                "node": node,
                "color": color,
                "border_only": opts.border_only,
                "include_edges": opts.include_edges,
            }),
        );
    }

    fn set_edge_style(&self, edges: &[EdgeId], color: &str, weight: Option<f32>, opacity: Option<f32>) {
        self.publish(
            &self.topics.edge_style,
            json!({ "edges": edges, "color": color, "weight": weight, "opacity": opacity }),
        );
    }

    fn set_fault_marker(&self, node: NodeId, icon: &str) {
        self.publish(&self.topics.marker, json!({ "node": node, "action": "set", "icon": icon }));
    }

    fn clear_fault_marker(&self, node: NodeId) {
        self.publish(&self.topics.marker, json!({ "node": node, "action": "clear" }));
    }
}

impl ChartSink for BusSink {
    fn append_sample(&self, node: NodeId, series: Series, timestamp: i64, value: f64) {
        self.publish(
            &self.topics.sample,
            json!({ "node": node, "series": series, "timestamp": timestamp, "value": value }),
        );
    }
}

impl AlertSink for BusSink {
    fn show(&self, message: &str, duration_ms: u64) {
        self.publish(&self.topics.alert, json!({ "message": message, "duration_ms": duration_ms }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::MqttOptions;

    #[test]
    fn test_topics_follow_prefix() {
        let topics = BusTopics::new("feeder/");
        assert_eq!(topics.node_style, "feeder/render/node@v1");
        assert_eq!(topics.edge_style, "feeder/render/edge@v1");
        assert_eq!(topics.marker, "feeder/render/marker@v1");
        assert_eq!(topics.sample, "feeder/chart/sample@v1");
        assert_eq!(topics.alert, "feeder/alerts@v1");
    }

    #[test]
    fn test_full_queue_never_blocks_or_panics() {
        let opts = MqttOptions::new("bus-test", "localhost", 1883);
        let (client, _eventloop) = AsyncClient::new(opts, 1);
        let sink = BusSink::new(client, "feeder");

        // aucune boucle d'événements ne vide la file : seuls les premiers messages passent
        for node in 1..=5 {
            sink.set_node_style(node, "#9e9e9e", NodeStyleOpts::default());
        }
        sink.set_edge_style(&[2, 3], "#9e9e9e", Some(4.0), Some(0.85));
        sink.show("Neutral Fault at Pole 3", 5000);
    }
}
