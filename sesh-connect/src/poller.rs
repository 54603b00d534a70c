use futures::{future::BoxFuture, task, FutureExt, Sink, Stream};
use sesh::{side::Side, Pipe, Session};
use sesh_wire::Packet;

type SendFut<IO, S> = BoxFuture<'static, (sesh::Result<()>, Box<Session<IO, S>>)>;
type RecvFut<IO, S> = BoxFuture<'static, (sesh::Result<Packet>, Box<Session<IO, S>>)>;

enum State<IO: Pipe, S: Side> {
    /// Idling and waiting for tasks.
    Idle(Box<Session<IO, S>>),

    /// Polling to send a packet.
    Sending(SendFut<IO, S>),

    /// Polling to receive a packet.
    Recving(RecvFut<IO, S>),
}

/// A poll-model adapter over an owned [`Session`], implementing
/// [`Sink`] for outbound packets and [`Stream`] for inbound ones.
///
/// Since the session is owned, at most one of the directions is
/// in flight at a time, packets on each direction stay strictly
/// ordered.
pub(crate) struct Poller<IO: Pipe, S: Side> {
    inner: State<IO, S>,
}

impl<IO, S> From<Session<IO, S>> for Poller<IO, S>
where
    IO: Pipe,
    S: Side,
{
    fn from(session: Session<IO, S>) -> Self {
        Self {
            inner: State::Idle(session.into()),
        }
    }
}

impl<IO, S> Poller<IO, S>
where
    IO: Pipe,
    S: Side,
{
    /// Queue a packet for sending when the poller is idle, without
    /// suspension. The queued send is driven to completion by the
    /// next task operating the poller.
    pub(crate) fn try_feed(&mut self, packet: Packet) -> bool {
        if !matches!(self.inner, State::Idle(_)) {
            return false;
        }

        replace_with::replace_with_or_abort(&mut self.inner, |inner| match inner {
            State::Idle(mut session) => {
                State::Sending(async move { (session.send(packet).await, session) }.boxed())
            }
            inner => inner,
        });

        true
    }
}

impl<IO, S> Sink<Packet> for Poller<IO, S>
where
    IO: Pipe,
    S: Side,
{
    type Error = sesh::Error;

    fn poll_ready(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Result<(), Self::Error>> {
        match &mut self.inner {
            State::Sending(fut) => {
                let (result, session) = futures::ready!(fut.poll_unpin(cx));

                self.inner = State::Idle(session);
                result?;

                cx.waker().wake_by_ref();
                task::Poll::Pending
            }
            State::Recving(_) => {
                cx.waker().wake_by_ref();
                task::Poll::Pending
            }
            State::Idle(_) => task::Poll::Ready(Ok(())),
        }
    }

    fn start_send(mut self: std::pin::Pin<&mut Self>, item: Packet) -> Result<(), Self::Error> {
        replace_with::replace_with_or_abort(&mut self.inner, |inner| match inner {
            State::Idle(mut session) => {
                State::Sending(async move { (session.send(item).await, session) }.boxed())
            }

            // This is a genuine programming error from us if this happens,
            // which makes sense to panic!() to ensure test failure.
            #[allow(clippy::panic)]
            _ => {
                panic!("Called `Sink::start_send` without calling `Sink::poll_ready` before")
            }
        });

        Ok(())
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Result<(), Self::Error>> {
        self.poll_ready(cx)
    }

    fn poll_close(
        self: std::pin::Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Result<(), Self::Error>> {
        self.poll_flush(cx)
    }
}

impl<IO, S> Stream for Poller<IO, S>
where
    IO: Pipe,
    S: Side,
{
    type Item = sesh::Result<Packet>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Self::Item>> {
        replace_with::replace_with_or_abort_and_return(
            &mut self.as_mut().inner,
            |inner| match inner {
                State::Idle(mut session) => {
                    // Only commit to a receive future once data is pending,
                    // so outbound packets are not starved by an idle read.
                    let mut fut = session.readable().boxed();

                    if fut.poll_unpin(cx).is_ready() {
                        drop(fut);

                        cx.waker().wake_by_ref();
                        (
                            task::Poll::Pending,
                            State::Recving(
                                async move { (session.recv().await, session) }.boxed(),
                            ),
                        )
                    } else {
                        drop(fut);

                        (task::Poll::Pending, State::Idle(session))
                    }
                }
                State::Recving(mut fut) => {
                    if let task::Poll::Ready((result, session)) = fut.as_mut().poll_unpin(cx) {
                        (
                            task::Poll::Ready(match result {
                                Err(sesh::Error::Disconnected(_)) => None,
                                item => Some(item),
                            }),
                            State::Idle(session),
                        )
                    } else {
                        (task::Poll::Pending, State::Recving(fut))
                    }
                }
                State::Sending(mut fut) => {
                    if let task::Poll::Ready((result, session)) = fut.as_mut().poll_unpin(cx) {
                        (
                            match result {
                                Err(sesh::Error::Disconnected(_)) => task::Poll::Ready(None),
                                Err(err) => task::Poll::Ready(Some(Err(err))),
                                Ok(_) => {
                                    cx.waker().wake_by_ref();
                                    task::Poll::Pending
                                }
                            },
                            State::Idle(session),
                        )
                    } else {
                        (task::Poll::Pending, State::Sending(fut))
                    }
                }
            },
        )
    }
}
