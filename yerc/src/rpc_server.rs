//! The register-polled RPC server.
//!
//! The controller requests a service call by writing `1` into an agreed
//! status register. The server polls a contiguous block of registers, runs
//! the matching service at most once concurrently, and writes the outcome
//! back: `0` on success, `2` on error.
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::commands::{ AnyCommand, AnyResponse, ReadUint8Vars, WriteUint8Vars };
use crate::constants::{ SERVICE_STATUS_ERROR, SERVICE_STATUS_IDLE, SERVICE_STATUS_REQUESTED };
use crate::error::{ Error, Result };

/// How long a single status register read or write may take.
const REGISTER_TIMEOUT: Duration = Duration::from_millis( 100 );

/// The outcome a service resolves with.
pub type ServiceResult = Result<()>;

/// The future returned by a service handler.
pub type ServiceFuture = Pin<Box<dyn Future<Output = ServiceResult> + Send>>;

/// A registered service handler.
pub type ServiceHandler = Box<dyn Fn() -> ServiceFuture + Send + Sync>;

/// The error sink invoked for every reportable, non-fatal error.
pub type ErrorSink = Arc<dyn Fn( Error ) + Send + Sync>;

/// Returns a handler that always resolves with
/// `invalid argument: service is disabled`. Registering it is legal; it
/// reserves a status register without exposing an operation.
pub fn disabled_service() -> ServiceHandler {
  Box::new( || -> ServiceFuture {
    Box::pin( async {
      Err( Error::InvalidArgument( "service is disabled".to_string() ) )
    })
  })
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - Rpc Service

// A registered service: a name for error reporting, a single-entry guard
// and the handler to run.
struct RpcService {
  name: String,
  busy: AtomicBool,
  handler: ServiceHandler
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - Rpc Server

/// A register-polled RPC server driven by a <Client>.
pub struct RpcServer {
  client: Arc<Client>,
  base_register: u8,
  delay: Duration,
  on_error: ErrorSink,
  services: Vec<Arc<RpcService>>,
  started: Arc<AtomicBool>,
  cancel: CancellationToken,
  _poller: Option<JoinHandle<()>>
}

impl RpcServer {
  /// Creates a stopped RPC server that will poll one status register per
  /// registered service, starting at `base_register`, every `delay`.
  pub fn new(
    client: Arc<Client>,
    base_register: u8,
    delay: Duration,
    on_error: impl Fn( Error ) + Send + Sync + 'static
  ) -> Self {
    Self{
      client,
      base_register,
      delay,
      on_error: Arc::new( on_error ),
      services: Vec::new(),
      started: Arc::new( AtomicBool::new( false ) ),
      cancel: CancellationToken::new(),
      _poller: None
    }
  }

  /// Registers a service. Only permitted while the server is stopped.
  pub fn add_service<F, Fut>( &mut self, name: impl Into<String>, handler: F ) -> Result<()>
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ServiceResult> + Send + 'static
  {
    self.add_service_handler( name, Box::new( move || -> ServiceFuture { Box::pin( handler() ) }) )
  }

  /// Registers a service that executes `preconditions` first.
  ///
  /// When every precondition succeeds the handler receives the decoded
  /// responses in input order. When one fails the service resolves with
  /// that error and the handler is not called.
  pub fn add_service_with_commands<F, Fut>(
    &mut self,
    name: impl Into<String>,
    preconditions: Vec<AnyCommand>,
    precondition_timeout: Duration,
    handler: F
  ) -> Result<()>
  where
    F: Fn( Vec<AnyResponse> ) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ServiceResult> + Send + 'static
  {
    let client = self.client.clone();
    let handler = Arc::new( handler );

    self.add_service_handler( name, Box::new( move || -> ServiceFuture {
      let client = client.clone();
      let preconditions = preconditions.clone();
      let handler = handler.clone();

      Box::pin( async move {
        let responses = client.send_commands( &preconditions, precondition_timeout ).await?;
        ( *handler )( responses ).await
      })
    }))
  }

  /// Registers a pre-boxed handler, such as the one returned by
  /// <disabled_service>. Only permitted while the server is stopped.
  pub fn add_service_handler( &mut self, name: impl Into<String>, handler: ServiceHandler ) -> Result<()> {
    if self.started.load( Ordering::Acquire ) {
      return Err( Error::InvalidArgument(
        "cannot register a service while the server is started".to_string()
      ));
    }

    // The status block must stay within the byte variable index space.
    let count = round_up_to_even( self.services.len() + 1 );
    if self.base_register as usize + count > 256 {
      return Err( Error::InvalidArgument(
        "the service status registers would extend past the last variable index".to_string()
      ));
    }

    self.services.push( Arc::new( RpcService{
      name: name.into(),
      busy: AtomicBool::new( false ),
      handler
    }));
    Ok(())
  }

  /// Starts polling. Returns false if the server was already started.
  pub fn start( &mut self ) -> bool {
    if self.started.swap( true, Ordering::AcqRel ) {
      return false;
    }

    self.cancel = CancellationToken::new();

    let poller = Poller{
      client: self.client.clone(),
      base_register: self.base_register,
      delay: self.delay,
      on_error: self.on_error.clone(),
      services: self.services.clone(),
      started: self.started.clone(),
      cancel: self.cancel.clone()
    };

    self._poller = Some( tokio::spawn( poller.run() ) );
    true
  }

  /// Stops polling as soon as possible. Returns false if the server was
  /// already stopped.
  ///
  /// In-flight service executions are allowed to finish and still write
  /// their status register; no new poll is scheduled.
  pub fn stop( &mut self ) -> bool {
    if !self.started.swap( false, Ordering::AcqRel ) {
      return false;
    }

    self.cancel.cancel();
    true
  }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -  Poller

// The polling loop, detached from the server handle so `stop` never blocks.
struct Poller {
  client: Arc<Client>,
  base_register: u8,
  delay: Duration,
  on_error: ErrorSink,
  services: Vec<Arc<RpcService>>,
  started: Arc<AtomicBool>,
  cancel: CancellationToken
}

impl Poller {
  async fn run( self ) {
    while self.started.load( Ordering::Acquire ) {
      self.read_commands().await;

      if !self.started.load( Ordering::Acquire ) {
        break;
      }

      if !self.delay.is_zero() {
        // A delay cut short by `stop` exits the loop silently.
        tokio::select!{
          _ = self.cancel.cancelled() => break,
          _ = tokio::time::sleep( self.delay ) => {}
        }
      }
    }
  }

  // One poll: read the status registers and start every requested service.
  async fn read_commands( &self ) {
    if self.services.is_empty() {
      return;
    }

    // The controller requires reading an even number of registers; the
    // padding registers read beyond the service table are ignored.
    let count = round_up_to_even( self.services.len() );
    let read = ReadUint8Vars{ index: self.base_register, count: count as u8 };

    match self.client.send_command( &read, REGISTER_TIMEOUT ).await {
      Err( error ) => ( *self.on_error )( error.context( "reading commands status variables" ) ),

      Ok( statuses ) => {
        for index in 0..self.services.len() {
          if statuses[index] == SERVICE_STATUS_REQUESTED {
            self.execute( index );
          }
        }
      }
    }
  }

  // Runs service `index` unless an execution is already in progress.
  fn execute( &self, index: usize ) {
    let service = self.services[index].clone();

    // Single-entry guard: the controller keeps the register at `requested`
    // until we write it back, so every poll in between lands here.
    if service.busy.swap( true, Ordering::AcqRel ) {
      return;
    }

    let client = self.client.clone();
    let on_error = self.on_error.clone();
    let status_register = self.base_register + index as u8;

    tokio::spawn( async move {
      let result = ( service.handler )().await;

      let failed = result.is_err();
      if let Err( error ) = result {
        ( *on_error )( error.context( format!( "executing service {}", service.name ) ) );
      }

      // The status register is written after success and failure alike.
      let status = if failed { SERVICE_STATUS_ERROR } else { SERVICE_STATUS_IDLE };
      let write = WriteUint8Vars{ index: status_register, values: vec![ status ] };

      if let Err( error ) = client.send_command( &write, REGISTER_TIMEOUT ).await {
        ( *on_error )( error.context( format!( "writing status for service {}", service.name ) ) );
      }

      // Cleared last: the next poll may re-enter this service only after
      // the status write completed.
      service.busy.store( false, Ordering::Release );
    });
  }
}

fn round_up_to_even( count: usize ) -> usize {
  count + ( count & 1 )
}
