use crate::binding::ArgumentProvider;
use crate::context::{RequestContext, ResponseSink};
use crate::route::{HandlerBinding, RoutingTable};
use crate::writer::WriterRegistry;
use std::sync::Arc;
use tracing::{debug, error};

/// Per-request orchestration: bind arguments, invoke the handler, resolve a
/// writer, write the response, terminate. The whole sequence is synchronous;
/// the transport owns concurrency. Owning a dispatcher seals the writer
/// registry, switching it to its read-only serving phase.
pub struct Dispatcher {
    table: Arc<RoutingTable>,
    writers: Arc<WriterRegistry>,
}

impl Dispatcher {
    pub fn new(table: RoutingTable, mut writers: WriterRegistry) -> Self {
        writers.seal();
        Self {
            table: Arc::new(table),
            writers: Arc::new(writers),
        }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn binding(&self, index: usize) -> Option<&HandlerBinding> {
        self.table.get(index)
    }

    /// Handles one matched request end to end. Every failure mode resolves
    /// to a single emitted response: binding failures map to 400, handler
    /// failures to their carried status (500 for plain ones). The final
    /// termination is skipped when a writer already ended the response.
    pub fn dispatch(
        &self,
        binding: &HandlerBinding,
        ctx: &RequestContext,
        response: &mut dyn ResponseSink,
    ) {
        let definition = binding.definition();

        let args = match ArgumentProvider::bind(definition, ctx) {
            Ok(args) => args,
            Err(e) => {
                debug!(route = %definition, error = %e, "argument binding failed");
                respond_error(response, 400, &e.to_string());
                return;
            }
        };

        let result = match binding.invoke(&args) {
            Ok(result) => result,
            Err(e) => {
                error!(route = %definition, status = e.status(), error = %e, "handler failed");
                respond_error(response, e.status(), &e.to_string());
                return;
            }
        };

        let writer = self.writers.resolve(result.type_key(), definition);
        writer.add_response_headers(definition, response);
        writer.write(&result, response);

        if !response.ended() {
            response.end();
        }
    }
}

fn respond_error(response: &mut dyn ResponseSink, status: u16, message: &str) {
    response.set_status(status);
    response.write_body(message.as_bytes());
    response.end();
}
