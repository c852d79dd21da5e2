//! The top-level `Transport`: wires the channel registry, inbound queue,
//! dispatch pipeline, transaction engine, DNS and STUN collaborators, and
//! route preprocessing into the single object an application embeds
//! (`spec.md` §4.6, §5 "Concurrency model", `SPEC_FULL.md` §2 "Graceful
//! shutdown").

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sip_core::prelude::{ChannelId, Message, Method, Request, Response, SipEndpoint, Uri};
use sip_transaction::prelude::{OutboundMessage, TimerSettings, TransactionEngine, TransactionKey};

use crate::channel::{Channel, InboundSink, RawInbound, SharedChannel};
use crate::config::TransportConfig;
use crate::dispatch::{dispatch_inbound, DispatchContext, DispatchResult};
use crate::dns::DnsResolver;
use crate::error::{Error, Result};
use crate::fixup::apply_send_fixups;
use crate::observer::{Observer, TransportCounters, TransportCountersSnapshot};
use crate::queue::InboundQueue;
use crate::registry::{ChannelFactory, ChannelRegistry};
use crate::route::{next_hop_uri, preprocess_route};
use crate::stun::StunSink;

struct Inner {
    registry: ChannelRegistry,
    engine: TransactionEngine,
    observer: Arc<Observer>,
    counters: Arc<TransportCounters>,
    config: TransportConfig,
    dns: Arc<dyn DnsResolver>,
    stun_sink: Option<StunSink>,
    factory: Option<Arc<dyn ChannelFactory>>,
    queue: InboundQueue,
    cancel: CancellationToken,
    shutting_down: AtomicBool,
}

/// The embeddable multi-transport stack. Cheaply cloneable; clones share
/// the same registry, queue and transaction table.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

impl Transport {
    pub fn new(
        config: TransportConfig,
        observer: Observer,
        dns: Arc<dyn DnsResolver>,
        stun_sink: Option<StunSink>,
        factory: Option<Arc<dyn ChannelFactory>>,
    ) -> (Self, tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>) {
        let (engine, outbound_rx) = TransactionEngine::new(TimerSettings::default(), sip_transaction::prelude::Observer::default());
        let (queue, queue_rx) = InboundQueue::new(config.inbound_queue_depth);
        let inner = Arc::new(Inner {
            registry: ChannelRegistry::new(),
            engine,
            observer: Arc::new(observer),
            counters: Arc::new(TransportCounters::default()),
            config,
            dns,
            stun_sink,
            factory,
            queue,
            cancel: CancellationToken::new(),
            shutting_down: AtomicBool::new(false),
        });

        let transport = Self { inner };
        let consumer = transport.clone().spawn_consumer_loop(queue_rx);
        let drain = transport.clone().spawn_outbound_drain_loop(outbound_rx);
        (transport, consumer, drain)
    }

    pub fn engine(&self) -> &TransactionEngine {
        &self.inner.engine
    }

    pub fn counters(&self) -> TransportCountersSnapshot {
        self.inner.counters.snapshot()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub async fn register_channel(&self, channel: SharedChannel) -> Result<()> {
        self.inner.registry.register(channel).await
    }

    pub async fn deregister_channel(&self, id: &ChannelId) -> Option<SharedChannel> {
        self.inner.registry.deregister(id).await
    }

    /// Entry point for a channel's own receive loop (`spec.md` §6: "call
    /// the transport's inbound handler for every received datagram").
    /// Queued mode pushes onto the bounded FIFO; stateless mode dispatches
    /// inline on the caller's task (`spec.md` §4.6 "Inbound queue").
    pub async fn on_inbound(&self, raw: RawInbound) {
        if self.inner.config.stateless {
            self.process_inbound(raw).await;
        } else {
            self.inner.queue.push(raw);
        }
    }

    /// A clone of `self` boxed behind the narrow [`InboundSink`] seam, for
    /// channel implementations that take `Arc<dyn InboundSink>` at
    /// construction time instead of depending on the concrete `Transport`.
    pub fn as_inbound_sink(&self) -> Arc<dyn InboundSink> {
        Arc::new(self.clone())
    }

    async fn process_inbound(&self, raw: RawInbound) {
        let ctx = DispatchContext {
            engine: &self.inner.engine,
            observer: &self.inner.observer,
            counters: &self.inner.counters,
            stun_sink: self.inner.stun_sink.as_ref(),
            max_message_size: self.inner.config.max_message_size,
        };
        let remote = raw.remote.clone();
        let channel_id = raw.channel_id.clone();
        match dispatch_inbound(&ctx, raw).await {
            DispatchResult::Handled => {}
            DispatchResult::Respond(message) => {
                if let Err(e) = self.send_to(message, &remote, Some(&channel_id)).await {
                    tracing::warn!(error = %e, "failed to send dispatch-generated response");
                }
            }
        }
    }

    fn spawn_consumer_loop(self, mut rx: mpsc::Receiver<RawInbound>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = self.inner.cancel.cancelled() => break,
                    raw = rx.recv() => {
                        match raw {
                            Some(raw) => self.process_inbound(raw).await,
                            None => break,
                        }
                    }
                    _ = tokio::time::sleep(self.inner.config.consumer_wake_interval) => {}
                }
            }
        })
    }

    fn spawn_outbound_drain_loop(self, mut rx: mpsc::UnboundedReceiver<OutboundMessage>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = self.inner.cancel.cancelled() => break,
                    next = rx.recv() => {
                        match next {
                            Some(OutboundMessage { key, message }) => self.deliver(key, message).await,
                            None => break,
                        }
                    }
                }
            }
        })
    }

    async fn deliver(&self, key: TransactionKey, message: Message) {
        let result = match &message {
            Message::Request(request) => self.send_request(request.clone(), None).await,
            Message::Response(response) => self.send_response_message(response.clone()).await,
        };
        if let Err(e) = result {
            tracing::warn!(%key, error = %e, "delivery failed for transaction");
        }
    }

    /// Sends a brand-new request: applies Route preprocessing, resolves the
    /// next hop, selects a channel and applies header fixups.
    pub async fn send_request(&self, mut request: Request, channel_hint: Option<ChannelId>) -> Result<()> {
        let local = self.inner.registry.snapshot().await;
        preprocess_route(&mut request, &|uri| is_local_channel_uri(&local, uri));
        let next_hop = next_hop_uri(&request).clone();
        let destination = match self.resolve(&next_hop).await {
            Some(endpoint) => endpoint,
            None => return Ok(()), // pending DNS resolution; a retransmit will retry
        };
        self.send_to(Message::Request(request), &destination, channel_hint.as_ref()).await
    }

    async fn send_response_message(&self, mut response: Response) -> Result<()> {
        let destination = response
            .received_from
            .clone()
            .ok_or_else(|| Error::NoRoute("response has no received-from endpoint to reply to".to_string()))?;
        let channel_hint = response.send_from_channel.clone();
        self.send_to(Message::Response(response), &destination, channel_hint.as_ref()).await
    }

    async fn resolve(&self, uri: &Uri) -> Option<SipEndpoint> {
        match self.inner.dns.resolve_from_cache(uri, false) {
            crate::dns::CacheLookup::Hit(endpoint) => Some(endpoint),
            crate::dns::CacheLookup::KnownFailure => None,
            crate::dns::CacheLookup::Miss => {
                let dns = self.inner.dns.clone();
                let uri = uri.clone();
                tokio::spawn(async move {
                    let _ = dns.resolve(&uri, false).await;
                });
                None
            }
        }
    }

    /// Selects (or opens on demand) a channel for `destination` and sends
    /// `message` out it, applying send-time header fixups first.
    async fn send_to(&self, mut message: Message, destination: &SipEndpoint, channel_hint: Option<&ChannelId>) -> Result<()> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Err(Error::ShuttingDown);
        }

        let channel = match self.inner.registry.select(destination, channel_hint).await {
            Some(channel) => channel,
            None if self.inner.config.allow_on_demand_channels => {
                let factory = self.inner.factory.as_ref().ok_or_else(|| Error::NoRoute(destination.to_string()))?;
                let channel = factory.create_client_channel(destination.protocol).await?;
                self.inner.registry.register(channel.clone()).await?;
                channel
            }
            None => return Err(Error::NoRoute(destination.to_string())),
        };

        self.inner.observer.notify_channel_selected(channel.id().clone(), destination.clone());

        let body_len = message.body().len();
        apply_send_fixups(
            message.headers_mut(),
            &channel.local_endpoint(),
            channel.transport(),
            self.inner.config.public_contact_host.as_deref(),
            body_len,
        );

        let bytes = bytes::Bytes::from(message.serialize());
        channel.send(destination.socket_addr(), bytes, destination.connection_id.clone(), &self.inner.cancel).await
    }

    /// `spec.md` §5 "Cancellation": cancels the transport-wide token, closes
    /// every channel, and drains the transaction table. Idempotent.
    pub async fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.cancel.cancel();
        self.inner.registry.close_all().await;
        self.inner.engine.shutdown().await;
    }
}

/// RFC 3261 §16.4 asks "does this Route URI name one of our own listening
/// channels". A hostname Route is compared against the literal host text a
/// channel happens to be configured with; an address Route is compared
/// against each channel's bound IP, ignoring port if the Route omits one.
#[async_trait::async_trait]
impl InboundSink for Transport {
    async fn on_receive(&self, raw: RawInbound) {
        self.on_inbound(raw).await;
    }
}

fn is_local_channel_uri(channels: &HashMap<ChannelId, SharedChannel>, uri: &Uri) -> bool {
    let host_str = uri.host.to_string();
    let matches_addr = host_str.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>().ok();

    channels.values().any(|channel| {
        let local = channel.local_endpoint();
        let host_matches = match matches_addr {
            Some(addr) => local.addr == addr || local.is_any(),
            None => false,
        };
        host_matches && uri.port.map_or(true, |p| p == local.port)
    })
}
