//! A local server that emulates a YERC robot controller for testing.
//!
//! The emulator binds one UDP socket for robot commands and one for file
//! transfers. Request parsing and response encoding are written out at
//! fixed byte offsets on purpose, so the library codec is checked against
//! an independent layout instead of being round-tripped through itself.
use std::collections::HashMap;
use std::io;
use std::net::{ IpAddr, Ipv4Addr, SocketAddr };
use std::sync::{ Arc, RwLock };

use tokio::net::UdpSocket;
use tokio::task;

use yerc::frame::PayloadReader;
use yerc::position::Position;

const HEADER_BYTES: usize = 32;
const MAX_PAYLOAD_BYTES: usize = 479;
const BLOCK_LAST: u32 = 0x8000_0000;

// Command status words reported for bad requests.
const STATUS_UNSUPPORTED: ( u8, u16 )  = ( 0x08, 0x0000 );
const STATUS_OUT_OF_RANGE: ( u8, u16 ) = ( 0x09, 0x0000 );
const STATUS_NO_SUCH_FILE: ( u8, u16 ) = ( 0x02, 0x0000 );

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -  Registers

/// The emulated controller state, shared with tests.
pub struct Registers {
  pub u8_vars: [u8; 256],
  pub i16_vars: [i16; 256],
  pub i32_vars: [i32; 256],
  pub f32_vars: [f32; 256],
  pub position_vars: Vec<Position>,
  pub status_data: ( u32, u32 ),
  pub current_position: Position,
  pub last_move_target: Option<Vec<u8>>,
  pub fail_next: Option<( u8, u16 )>
}

impl Default for Registers {
  fn default() -> Self {
    Self{
      u8_vars: [0; 256],
      i16_vars: [0; 256],
      i32_vars: [0; 256],
      f32_vars: [0.0; 256],
      position_vars: vec![Position::default(); 16],
      status_data: ( 0, 0 ),
      current_position: Position::default(),
      last_move_target: None,
      fail_next: None
    }
  }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -  Emulator

pub struct Emulator {
  robot_address: SocketAddr,
  file_address: SocketAddr,
  registers: Arc<RwLock<Registers>>,
  files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
  _robot_task: task::JoinHandle<io::Result<()>>,
  _file_task: task::JoinHandle<io::Result<()>>
}

impl Emulator {
  /// Starts an emulated controller on two ephemeral localhost ports.
  pub async fn start() -> io::Result<Self> {
    let local = SocketAddr::new( IpAddr::V4( Ipv4Addr::LOCALHOST ), 0 );

    let robot_socket = UdpSocket::bind( local ).await?;
    let robot_address = robot_socket.local_addr()?;
    let file_socket = UdpSocket::bind( local ).await?;
    let file_address = file_socket.local_addr()?;

    let registers = Arc::new( RwLock::new( Registers::default() ) );
    let files = Arc::new( RwLock::new( HashMap::new() ) );

    let robot_task = tokio::spawn( run_robot( robot_socket, registers.clone() ) );
    let file_task = tokio::spawn( run_file( file_socket, files.clone() ) );

    Ok( Self{
      robot_address,
      file_address,
      registers,
      files,
      _robot_task: robot_task,
      _file_task: file_task
    })
  }

  pub fn robot_address( &self ) -> SocketAddr {
    self.robot_address
  }

  pub fn file_address( &self ) -> SocketAddr {
    self.file_address
  }

  pub fn u8_var( &self, index: u8 ) -> u8 {
    self.registers.read().expect( "registers poisoned" ).u8_vars[index as usize]
  }

  pub fn set_u8_var( &self, index: u8, value: u8 ) {
    self.registers.write().expect( "registers poisoned" ).u8_vars[index as usize] = value;
  }

  pub fn set_status( &self, data1: u32, data2: u32 ) {
    self.registers.write().expect( "registers poisoned" ).status_data = ( data1, data2 );
  }

  pub fn set_current_position( &self, position: Position ) {
    self.registers.write().expect( "registers poisoned" ).current_position = position;
  }

  /// Makes the next robot command fail with the given status words.
  pub fn fail_next_command( &self, status: u8, extra_status: u16 ) {
    self.registers.write().expect( "registers poisoned" ).fail_next = Some(( status, extra_status ));
  }

  /// Returns the raw payload of the last accepted move command.
  pub fn last_move_target( &self ) -> Option<Vec<u8>> {
    self.registers.read().expect( "registers poisoned" ).last_move_target.clone()
  }

  pub fn set_file( &self, name: &str, data: &[u8] ) {
    self.files.write().expect( "file store poisoned" ).insert( name.to_string(), data.to_vec() );
  }

  pub fn file( &self, name: &str ) -> Option<Vec<u8>> {
    self.files.read().expect( "file store poisoned" ).get( name ).cloned()
  }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - Frame Handling

// A parsed request frame.
struct Request {
  division: u8,
  request_id: u8,
  block_number: u32,
  command: u16,
  instance: u16,
  service: u8,
  payload: Vec<u8>
}

fn parse_request( datagram: &[u8] ) -> Option<Request> {
  if datagram.len() < HEADER_BYTES || &datagram[0..4] != b"YERC" {
    return None;
  }

  let payload_size = u16::from_le_bytes([ datagram[6], datagram[7] ]) as usize;
  if datagram.len() != HEADER_BYTES + payload_size {
    return None;
  }

  Some( Request{
    division: datagram[9],
    request_id: datagram[11],
    block_number: u32::from_le_bytes( datagram[12..16].try_into().ok()? ),
    command: u16::from_le_bytes([ datagram[24], datagram[25] ]),
    instance: u16::from_le_bytes([ datagram[26], datagram[27] ]),
    service: datagram[29],
    payload: datagram[HEADER_BYTES..].to_vec()
  })
}

fn encode_response( request: &Request, block_number: u32, status: u8, extra_status: u16, payload: &[u8] ) -> Vec<u8> {
  let mut out = Vec::with_capacity( HEADER_BYTES + payload.len() );
  out.extend_from_slice( b"YERC" );
  out.extend_from_slice( &32u16.to_le_bytes() );
  out.extend_from_slice( &( payload.len() as u16 ).to_le_bytes() );
  out.push( 0x03 );
  out.push( request.division );
  out.push( 1 ); // ack
  out.push( request.request_id );
  out.extend_from_slice( &block_number.to_le_bytes() );
  out.extend_from_slice( &[b'9'; 8] );
  out.push( request.service );
  out.push( status );
  out.extend_from_slice( &[0; 2] );
  out.extend_from_slice( &extra_status.to_le_bytes() );
  out.extend_from_slice( &[0; 2] );
  out.extend_from_slice( payload );
  out
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - Robot Division

async fn run_robot( socket: UdpSocket, registers: Arc<RwLock<Registers>> ) -> io::Result<()> {
  let mut buf = [0u8; 512];

  loop {
    let ( length, remote ) = socket.recv_from( &mut buf ).await?;
    let Some( request ) = parse_request( &buf[..length] ) else { continue };

    let forced = registers.write().expect( "registers poisoned" ).fail_next.take();
    let response = match forced {
      Some(( status, extra_status )) => encode_response( &request, 0, status, extra_status, &[] ),
      None => match handle_robot_command( &request, &registers ) {
        Ok( payload ) => encode_response( &request, 0, 0, 0, &payload ),
        Err(( status, extra_status )) => encode_response( &request, 0, status, extra_status, &[] )
      }
    };

    socket.send_to( &response, remote ).await?;
  }
}

fn handle_robot_command( request: &Request, registers: &Arc<RwLock<Registers>> ) -> Result<Vec<u8>, ( u8, u16 )> {
  let mut registers = registers.write().expect( "registers poisoned" );

  match request.command {
    // Status read: two little-endian data words.
    0x0072 => {
      let ( data1, data2 ) = registers.status_data;
      let mut payload = Vec::with_capacity( 8 );
      payload.extend_from_slice( &data1.to_le_bytes() );
      payload.extend_from_slice( &data2.to_le_bytes() );
      Ok( payload )
    },

    // Current position read.
    0x0075 => {
      let mut payload = Vec::new();
      registers.current_position.encode( &mut payload );
      Ok( payload )
    },

    // Variable access.
    0x007F => {
      let vars = registers.u8_vars;
      handle_var_access( request, 256, | index |{
        let mut cell = vec![ vars[index] ];
        cell.extend_from_slice( &[0; 3] );
        cell
      }, | index, cell |{
        registers.u8_vars[index] = cell[0];
      })
    },

    0x0080 => {
      let vars = registers.i16_vars;
      handle_var_access( request, 256, | index |{
        let mut cell = vars[index].to_le_bytes().to_vec();
        cell.extend_from_slice( &[0; 2] );
        cell
      }, | index, cell |{
        registers.i16_vars[index] = i16::from_le_bytes([ cell[0], cell[1] ]);
      })
    },

    0x0081 => {
      let vars = registers.i32_vars;
      handle_var_access( request, 256, | index |{
        vars[index].to_le_bytes().to_vec()
      }, | index, cell |{
        registers.i32_vars[index] = i32::from_le_bytes([ cell[0], cell[1], cell[2], cell[3] ]);
      })
    },

    0x0082 => {
      let vars = registers.f32_vars;
      handle_var_access( request, 256, | index |{
        vars[index].to_bits().to_le_bytes().to_vec()
      }, | index, cell |{
        registers.f32_vars[index] = f32::from_bits( u32::from_le_bytes([ cell[0], cell[1], cell[2], cell[3] ]) );
      })
    },

    0x0083 => {
      let vars = registers.position_vars.clone();
      handle_position_access( request, &vars, &mut registers.position_vars )
    },

    // Move: record the raw payload as the accepted target.
    0x008A => {
      if request.payload.len() != 104 {
        return Err( STATUS_UNSUPPORTED );
      }
      registers.last_move_target = Some( request.payload.clone() );
      Ok( Vec::new() )
    },

    _ => Err( STATUS_UNSUPPORTED )
  }
}

// Decodes the service and count of a variable access request. Returns the
// starting index, the count and the value cells of a write (empty for
// reads).
fn var_access_range( request: &Request, bank_size: usize, cell_bytes: usize ) -> Result<( usize, usize, Vec<u8> ), ( u8, u16 )> {
  let index = request.instance as usize;

  let ( count, cells ) = match request.service {
    0x0E => ( 1, Vec::new() ),
    0x10 => ( 1, request.payload.clone() ),
    0x33 => {
      if request.payload.len() != 4 {
        return Err( STATUS_UNSUPPORTED );
      }
      let count = u32::from_le_bytes( request.payload[0..4].try_into().expect( "sized slice" ) ) as usize;
      ( count, Vec::new() )
    },
    0x34 => {
      if request.payload.len() < 4 {
        return Err( STATUS_UNSUPPORTED );
      }
      let count = u32::from_le_bytes( request.payload[0..4].try_into().expect( "sized slice" ) ) as usize;
      ( count, request.payload[4..].to_vec() )
    },
    _ => return Err( STATUS_UNSUPPORTED )
  };

  if count == 0 || index + count > bank_size {
    return Err( STATUS_OUT_OF_RANGE );
  }

  let writing = request.service == 0x10 || request.service == 0x34;
  if writing && cells.len() != count * cell_bytes {
    return Err( STATUS_UNSUPPORTED );
  }

  Ok(( index, count, cells ))
}

fn handle_var_access(
  request: &Request,
  bank_size: usize,
  read_cell: impl Fn( usize ) -> Vec<u8>,
  mut write_cell: impl FnMut( usize, &[u8] )
) -> Result<Vec<u8>, ( u8, u16 )> {
  let ( index, count, cells ) = var_access_range( request, bank_size, 4 )?;

  if cells.is_empty() && ( request.service == 0x0E || request.service == 0x33 ) {
    let mut payload = Vec::with_capacity( count * 4 );
    for offset in 0..count {
      payload.extend_from_slice( &read_cell( index + offset ) );
    }
    return Ok( payload );
  }

  for ( offset, cell ) in cells.chunks( 4 ).enumerate() {
    write_cell( index + offset, cell );
  }
  Ok( Vec::new() )
}

fn handle_position_access( request: &Request, vars: &[Position], store: &mut [Position] ) -> Result<Vec<u8>, ( u8, u16 )> {
  let ( index, count, cells ) = var_access_range( request, vars.len(), 52 )?;

  if cells.is_empty() && ( request.service == 0x0E || request.service == 0x33 ) {
    let mut payload = Vec::with_capacity( count * 52 );
    for offset in 0..count {
      vars[index + offset].encode( &mut payload );
    }
    return Ok( payload );
  }

  let mut reader = PayloadReader::new( &cells );
  for offset in 0..count {
    match Position::decode( &mut reader ) {
      Ok( position ) => store[index + offset] = position,
      Err( _ ) => return Err( STATUS_UNSUPPORTED )
    }
  }
  Ok( Vec::new() )
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -  File Division

// Serves one file transfer at a time; datagrams from other transfers that
// arrive mid-stream are dropped, which the client treats as lost blocks.
async fn run_file( socket: UdpSocket, files: Arc<RwLock<HashMap<String, Vec<u8>>>> ) -> io::Result<()> {
  let mut buf = [0u8; 512];

  loop {
    let ( length, remote ) = socket.recv_from( &mut buf ).await?;
    let Some( request ) = parse_request( &buf[..length] ) else { continue };
    let name = String::from_utf8_lossy( &request.payload ).to_string();

    match request.service {
      // Delete.
      0x09 => {
        let removed = files.write().expect( "file store poisoned" ).remove( &name ).is_some();
        let response = if removed {
          encode_response( &request, 0, 0, 0, &[] )
        } else {
          encode_response( &request, 0, STATUS_NO_SUCH_FILE.0, STATUS_NO_SUCH_FILE.1, &[] )
        };
        socket.send_to( &response, remote ).await?;
      },

      // File read and file list: stream blocks, awaiting an ack per block.
      0x16 | 0x32 => {
        let data = if request.service == 0x16 {
          let found = files.read().expect( "file store poisoned" ).get( &name ).cloned();
          match found {
            Some( data ) => data,
            None => {
              let response = encode_response( &request, 0, STATUS_NO_SUCH_FILE.0, STATUS_NO_SUCH_FILE.1, &[] );
              socket.send_to( &response, remote ).await?;
              continue;
            }
          }
        } else {
          let mut names: Vec<String> = files.read().expect( "file store poisoned" )
            .keys()
            .filter( | file |{ matches_pattern( file, &name ) })
            .cloned()
            .collect();
          names.sort();
          names.join( "\r\n" ).into_bytes()
        };

        stream_blocks( &socket, remote, &request, &data, &mut buf ).await?;
      },

      // File write: ack the opening frame, then collect data blocks.
      0x15 => {
        let response = encode_response( &request, 0, 0, 0, &[] );
        socket.send_to( &response, remote ).await?;

        let mut data = Vec::new();
        loop {
          let ( length, _ ) = socket.recv_from( &mut buf ).await?;
          let Some( block ) = parse_request( &buf[..length] ) else { continue };
          if block.request_id != request.request_id {
            continue;
          }

          data.extend_from_slice( &block.payload );
          let ack = encode_response( &block, block.block_number, 0, 0, &[] );
          socket.send_to( &ack, remote ).await?;

          if block.block_number & BLOCK_LAST != 0 {
            break;
          }
        }

        files.write().expect( "file store poisoned" ).insert( name, data );
      },

      _ => {
        let response = encode_response( &request, 0, STATUS_UNSUPPORTED.0, STATUS_UNSUPPORTED.1, &[] );
        socket.send_to( &response, remote ).await?;
      }
    }
  }
}

async fn stream_blocks( socket: &UdpSocket, remote: SocketAddr, request: &Request, data: &[u8], buf: &mut [u8; 512] ) -> io::Result<()> {
  let chunks: Vec<&[u8]> = if data.is_empty() {
    vec![ &[] ]
  } else {
    data.chunks( MAX_PAYLOAD_BYTES ).collect()
  };

  let count = chunks.len();
  for ( index, chunk ) in chunks.into_iter().enumerate() {
    let mut block_number = index as u32 + 1;
    let last = index + 1 == count;
    if last {
      block_number |= BLOCK_LAST;
    }

    let response = encode_response( request, block_number, 0, 0, chunk );
    socket.send_to( &response, remote ).await?;

    if !last {
      // Wait for the client's continuation ack before the next block.
      loop {
        let ( length, _ ) = socket.recv_from( buf ).await?;
        let Some( ack ) = parse_request( &buf[..length] ) else { continue };
        if ack.request_id == request.request_id && ack.block_number == block_number {
          break;
        }
      }
    }
  }

  Ok(())
}

fn matches_pattern( name: &str, pattern: &str ) -> bool {
  match pattern.strip_prefix( '*' ) {
    Some( suffix ) => name.ends_with( suffix ),
    None => name == pattern
  }
}
