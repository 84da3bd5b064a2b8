/*!
Mock MQTT et publication de scénarios

`MockMqttClient` enregistre tout ce qui est publié pour les assertions de tests;
`FeedPublisher` permet de rejouer un scénario indifféremment sur le mock ou sur
un vrai `rumqttc::AsyncClient`.
*/

use anyhow::Result;
use rumqttc::{AsyncClient, QoS};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::telemetry::{pole_topic, PolePayload};

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Cible de publication de télémétrie
#[allow(async_fn_in_trait)]
pub trait FeedPublisher {
    async fn publish_bytes(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

impl FeedPublisher for AsyncClient {
    async fn publish_bytes(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.publish(topic, QoS::AtLeastOnce, false, payload).await?;
        Ok(())
    }
}

/// Publie chaque payload sur `{prefix}/{pole_id}`, renvoie le nombre envoyé
pub async fn publish_payloads<P: FeedPublisher>(publisher: &P, prefix: &str, payloads: &[PolePayload]) -> Result<usize> {
    for payload in payloads {
        let topic = pole_topic(prefix, payload.pole_id);
        publisher.publish_bytes(&topic, payload.to_bytes()?).await?;
        log::debug!("📤 {} {} ({})", topic, payload.status, payload.fault_type);
    }
    Ok(payloads.len())
}

/// Mock MQTT Client qui simule rumqttc::AsyncClient
#[derive(Clone, Default)]
pub struct MockMqttClient {
    published_messages: Arc<Mutex<Vec<MockMessage>>>,
}

fn guard<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage { topic: topic.into(), payload: payload.into(), qos, retain };
        log::info!("📤 [MOCK] Published to {}: {} bytes", message.topic, message.payload.len());
        guard(&self.published_messages).push(message);
        Ok(())
    }

    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        guard(&self.published_messages).clone()
    }

    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        guard(&self.published_messages).iter().filter(|msg| msg.topic == topic).cloned().collect()
    }

    /// Parse le dernier message d'un topic en JSON
    pub fn get_last_json_message<T>(&self, topic: &str) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        match self.find_messages_by_topic(topic).last() {
            Some(last_msg) => Ok(Some(serde_json::from_slice(&last_msg.payload)?)),
            None => Ok(None),
        }
    }

    pub fn clear(&self) {
        guard(&self.published_messages).clear();
    }
}

impl FeedPublisher for MockMqttClient {
    async fn publish_bytes(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.publish(topic, QoS::AtLeastOnce, false, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{Scenario, DEFAULT_FEEDER};

    #[tokio::test]
    async fn test_scenario_lands_on_pole_topics() {
        let client = MockMqttClient::new();
        let sent = publish_payloads(&client, "scada/poles", &Scenario::AllClear.payloads(&DEFAULT_FEEDER, 7))
            .await
            .unwrap();
        assert_eq!(sent, 5);

        let messages = client.get_published_messages();
        let topics: Vec<_> = messages.iter().map(|m| m.topic.as_str()).collect();
        assert_eq!(topics, ["scada/poles/5", "scada/poles/4", "scada/poles/3", "scada/poles/2", "scada/poles/1"]);

        let last: PolePayload = client.get_last_json_message("scada/poles/1").unwrap().unwrap();
        assert_eq!(last.pole_id, 1);
        assert_eq!(last.status, "OK");
    }

    #[tokio::test]
    async fn test_clear_and_missing_topic() {
        let client = MockMqttClient::new();
        client.publish("scada/poles/3", QoS::AtMostOnce, false, b"{}".to_vec()).await.unwrap();
        client.clear();
        assert!(client.get_published_messages().is_empty());

        let none: Option<serde_json::Value> = client.get_last_json_message("scada/poles/3").unwrap();
        assert!(none.is_none());
    }
}
