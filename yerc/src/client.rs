//! The asynchronous UDP client: request correlation, deadlines, command
//! batches and multi-block file transfers.
use std::collections::HashMap;
use std::net::{ IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr };
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::{ Arc, Mutex };
use std::time::Duration;

use futures::future;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{ self, Instant };
use tracing::warn;

use crate::commands::{ AnyCommand, AnyResponse, Command };
use crate::constants::*;
use crate::error::{ Error, Result };
use crate::frame::{ self, Division, RequestBody, ResponseHeader };

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -  Client Config

/// Configuration builder for a <Client>.
#[derive( Clone, Copy, Debug )]
pub struct ClientConfig {
  robot_address: SocketAddr,
  file_address: SocketAddr
}

impl ClientConfig {
  /// Creates a configuration for the controller at `address` using the
  /// default robot and file ports.
  pub fn new( address: IpAddr ) -> Self {
    Self{
      robot_address: SocketAddr::new( address, ROBOT_PORT ),
      file_address: SocketAddr::new( address, FILE_PORT )
    }
  }

  /// Overrides the endpoint for robot commands.
  pub fn robot_address( mut self, address: SocketAddr ) -> Self {
    self.robot_address = address;
    self
  }

  /// Overrides the endpoint for file commands.
  pub fn file_address( mut self, address: SocketAddr ) -> Self {
    self.file_address = address;
    self
  }

  /// Connects both transports and starts their response readers.
  pub async fn connect( self ) -> Result<Client> {
    Ok( Client{
      robot: Transport::connect( self.robot_address, Division::Robot ).await?,
      file: Transport::connect( self.file_address, Division::File ).await?
    })
  }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -  Client

/// An asynchronous client for one robot controller.
pub struct Client {
  robot: Transport,
  file: Transport
}

impl Client {
  /// Connects to the controller at `address` using the default ports.
  pub async fn connect( address: IpAddr ) -> Result<Client> {
    ClientConfig::new( address ).connect().await
  }

  /// Sends a single command and decodes its typed response.
  pub async fn send_command<C: Command>( &self, command: &C, timeout: Duration ) -> Result<C::Response> {
    let body = command.request()?;
    let ( _header, payload ) = self.robot.round_trip( &body, timeout ).await?;
    command.decode_response( &payload )
  }

  /// Sends a batch of commands concurrently under one aggregate deadline.
  ///
  /// Each command is dispatched with a fresh request id and no ordering
  /// between the individual requests. The batch resolves once every command
  /// has completed, with the responses in input order or with the first
  /// error in input order.
  pub async fn send_commands( &self, commands: &[AnyCommand], timeout: Duration ) -> Result<Vec<AnyResponse>> {
    let sends = commands.iter().map( | command |{ self.send_any( command, timeout ) });
    let results = future::join_all( sends ).await;

    let mut responses = Vec::with_capacity( results.len() );
    for result in results {
      responses.push( result? );
    }
    Ok( responses )
  }

  async fn send_any( &self, command: &AnyCommand, timeout: Duration ) -> Result<AnyResponse> {
    let body = command.request()?;
    let ( _header, payload ) = self.robot.round_trip( &body, timeout ).await?;
    command.decode_response( &payload )
  }

  /// Reads the contents of `name` from the controller's file system.
  pub async fn read_file( &self, name: &str, timeout: Duration ) -> Result<Vec<u8>> {
    let body = file_body( SERVICE_FILE_READ, name );
    self.file.receive_blocks( &body, timeout ).await
  }

  /// Lists the file names matching `pattern` (for example `*.JBI`).
  pub async fn read_file_list( &self, pattern: &str, timeout: Duration ) -> Result<Vec<String>> {
    let body = file_body( SERVICE_FILE_LIST, pattern );
    let data = self.file.receive_blocks( &body, timeout ).await?;
    let names = String::from_utf8_lossy( &data );
    Ok( names.split( "\r\n" ).filter( | name |{ !name.is_empty() }).map( str::to_string ).collect() )
  }

  /// Writes `data` to `name` on the controller's file system.
  pub async fn write_file( &self, name: &str, data: &[u8], timeout: Duration ) -> Result<()> {
    let body = file_body( SERVICE_FILE_WRITE, name );
    self.file.send_blocks( &body, data, timeout ).await
  }

  /// Deletes `name` from the controller's file system.
  pub async fn delete_file( &self, name: &str, timeout: Duration ) -> Result<()> {
    let body = file_body( SERVICE_FILE_DELETE, name );
    let _ = self.file.round_trip( &body, timeout ).await?;
    Ok(())
  }

  /// Closes both transports. Every in-flight request resolves with
  /// `Cancelled` and later sends fail with `Cancelled`.
  pub fn close( &self ) {
    self.robot.close();
    self.file.close();
  }
}

fn file_body( service: u8, name: &str ) -> RequestBody {
  RequestBody{
    command: 0x0000,
    instance: 0,
    attribute: 0,
    service,
    payload: name.as_bytes().to_vec()
  }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - In-flight Table

struct InFlight {
  next_id: u8,
  pending: HashMap<u8, mpsc::UnboundedSender<Vec<u8>>>
}

// An in-flight request. Dropping it removes the table entry, so timed-out
// and cancelled requests deregister themselves.
struct PendingRequest<'t> {
  transport: &'t Transport,
  request_id: u8,
  receiver: mpsc::UnboundedReceiver<Vec<u8>>
}

impl PendingRequest<'_> {
  // Waits for the next datagram routed to this request, up to `deadline`.
  async fn recv( &mut self, deadline: Instant ) -> Result<Vec<u8>> {
    match time::timeout_at( deadline, self.receiver.recv() ).await {
      Ok( Some( datagram ) ) => Ok( datagram ),
      Ok( None ) => Err( Error::Cancelled ),
      Err( _elapsed ) => Err( Error::Timeout )
    }
  }
}

impl Drop for PendingRequest<'_> {
  fn drop( &mut self ) {
    let mut table = self.transport.in_flight.lock().expect( "in-flight table poisoned" );
    table.pending.remove( &self.request_id );
  }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -  Transport

// One protocol division: a connected socket, the reader task that routes
// responses by request id, and the table of in-flight requests.
struct Transport {
  division: Division,
  socket: Arc<UdpSocket>,
  in_flight: Arc<Mutex<InFlight>>,
  closed: AtomicBool,
  reader: JoinHandle<()>
}

impl Transport {
  async fn connect( address: SocketAddr, division: Division ) -> Result<Transport> {
    let local: SocketAddr = if address.is_ipv4() {
      ( Ipv4Addr::UNSPECIFIED, 0 ).into()
    } else {
      ( Ipv6Addr::UNSPECIFIED, 0 ).into()
    };

    let socket = UdpSocket::bind( local ).await?;
    socket.connect( address ).await?;

    let socket = Arc::new( socket );
    let in_flight = Arc::new( Mutex::new( InFlight{ next_id: 0, pending: HashMap::new() } ) );

    // Routes every received datagram to the matching in-flight request.
    let reader = tokio::spawn({
      let socket = socket.clone();
      let in_flight = in_flight.clone();

      async move {
        let mut buf = [0u8; MAX_DATAGRAM_BYTES];

        loop {
          let length = match socket.recv( &mut buf ).await {
            Ok( length ) => length,
            Err( error ) => {
              warn!( "datagram receive failed: {}", error );
              continue;
            }
          };

          let datagram = &buf[..length];
          let Some( request_id ) = frame::peek_request_id( datagram ) else {
            warn!( "dropping a {} byte datagram that is not a protocol frame", length );
            continue;
          };

          let sender = in_flight
            .lock().expect( "in-flight table poisoned" )
            .pending.get( &request_id ).cloned();

          match sender {
            Some( sender ) => {
              let _ = sender.send( datagram.to_vec() );
            },
            None => warn!( "{}", Error::UnknownRequest( request_id ) )
          }
        }
      }
    });

    Ok( Transport{
      division,
      socket,
      in_flight,
      closed: AtomicBool::new( false ),
      reader
    })
  }

  // Registers a new in-flight request under a fresh request id.
  fn register( &self ) -> Result<PendingRequest<'_>> {
    if self.closed.load( Ordering::Acquire ) {
      return Err( Error::Cancelled );
    }

    let mut table = self.in_flight.lock().expect( "in-flight table poisoned" );
    if table.pending.len() > u8::MAX as usize {
      return Err( Error::TooManyInFlight );
    }

    // The id counter wraps; ids still in flight are skipped.
    let mut request_id = table.next_id;
    while table.pending.contains_key( &request_id ) {
      request_id = request_id.wrapping_add( 1 );
    }
    table.next_id = request_id.wrapping_add( 1 );

    let ( sender, receiver ) = mpsc::unbounded_channel();
    table.pending.insert( request_id, sender );

    Ok( PendingRequest{ transport: self, request_id, receiver } )
  }

  // One single-block command round trip.
  async fn round_trip( &self, body: &RequestBody, timeout: Duration ) -> Result<( ResponseHeader, Vec<u8> )> {
    check_payload_size( body )?;

    let deadline = Instant::now() + timeout;
    let mut pending = self.register()?;

    let mut datagram = Vec::new();
    frame::encode_request( &mut datagram, self.division, pending.request_id, 0, body );
    self.socket.send( &datagram ).await?;

    let response = pending.recv( deadline ).await?;
    let ( header, payload ) = frame::decode_response_header( &response )?;

    if header.status != 0 {
      return Err( Error::CommandFailed{ status: header.status, extra_status: header.extra_status } );
    }

    Ok(( header, payload.to_vec() ))
  }

  // Sends one request and reassembles a multi-block response. Each
  // non-final block is acknowledged; blocks arriving out of order are
  // dropped without state change.
  async fn receive_blocks( &self, body: &RequestBody, timeout: Duration ) -> Result<Vec<u8>> {
    check_payload_size( body )?;

    let deadline = Instant::now() + timeout;
    let mut pending = self.register()?;

    let mut request = Vec::new();
    frame::encode_request( &mut request, self.division, pending.request_id, 0, body );
    self.socket.send( &request ).await?;

    let mut data = Vec::new();
    let mut expected_block: u32 = 1;

    loop {
      let response = pending.recv( deadline ).await?;
      let ( header, payload ) = frame::decode_response_header( &response )?;

      if header.status != 0 {
        return Err( Error::CommandFailed{ status: header.status, extra_status: header.extra_status } );
      }

      let last = header.block_number & BLOCK_LAST != 0;
      let block_number = header.block_number & !BLOCK_LAST;

      if block_number != expected_block {
        warn!( "dropping block {} while expecting block {}", block_number, expected_block );
        continue;
      }

      data.extend_from_slice( payload );

      if last {
        return Ok( data );
      }

      let ack = frame::encode_continuation_ack( self.division, pending.request_id, header.block_number );
      self.socket.send( &ack ).await?;
      expected_block += 1;
    }
  }

  // Streams `data` in blocks after an opening request frame, waiting for
  // the peer's acknowledgement of every block before sending the next.
  async fn send_blocks( &self, body: &RequestBody, data: &[u8], timeout: Duration ) -> Result<()> {
    check_payload_size( body )?;

    let deadline = Instant::now() + timeout;
    let mut pending = self.register()?;

    let mut request = Vec::new();
    frame::encode_request( &mut request, self.division, pending.request_id, 0, body );
    self.socket.send( &request ).await?;
    self.await_block_ack( &mut pending, deadline, 0 ).await?;

    let chunks: Vec<&[u8]> = if data.is_empty() {
      vec![ &[] ]
    } else {
      data.chunks( MAX_PAYLOAD_BYTES ).collect()
    };

    let count = chunks.len();
    for ( index, chunk ) in chunks.into_iter().enumerate() {
      let mut block_number = index as u32 + 1;
      if index + 1 == count {
        block_number |= BLOCK_LAST;
      }

      let block_body = RequestBody{ payload: chunk.to_vec(), ..body.clone() };
      let mut datagram = Vec::new();
      frame::encode_request( &mut datagram, self.division, pending.request_id, block_number, &block_body );
      self.socket.send( &datagram ).await?;
      self.await_block_ack( &mut pending, deadline, block_number ).await?;
    }

    Ok(())
  }

  // Waits for the peer to acknowledge `block_number`, dropping other blocks.
  async fn await_block_ack( &self, pending: &mut PendingRequest<'_>, deadline: Instant, block_number: u32 ) -> Result<()> {
    loop {
      let response = pending.recv( deadline ).await?;
      let ( header, _payload ) = frame::decode_response_header( &response )?;

      if header.status != 0 {
        return Err( Error::CommandFailed{ status: header.status, extra_status: header.extra_status } );
      }

      if header.block_number == block_number {
        return Ok(());
      }

      warn!( "dropping acknowledgement of block {} while expecting block {}", header.block_number, block_number );
    }
  }

  fn close( &self ) {
    self.closed.store( true, Ordering::Release );
    self.reader.abort();

    // Dropping the senders resolves every pending receiver with `Cancelled`.
    let mut table = self.in_flight.lock().expect( "in-flight table poisoned" );
    table.pending.clear();
  }
}

impl Drop for Transport {
  fn drop( &mut self ) {
    self.reader.abort();
  }
}

fn check_payload_size( body: &RequestBody ) -> Result<()> {
  if body.payload.len() > MAX_PAYLOAD_BYTES {
    return Err( Error::InvalidArgument( format!(
      "request payload ({} bytes) exceeds the maximum payload size ({} bytes)",
      body.payload.len(), MAX_PAYLOAD_BYTES
    )));
  }
  Ok(())
}
