//! Encoding and decoding of YERC protocol frames.
//!
//! A frame is a fixed 32-byte header followed by up to 479 bytes of payload.
//! All multi-byte integer fields are little-endian.
use crate::constants::*;
use crate::error::{ Error, Result };

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - Division

/// Distinguishes robot-command frames from file-transfer frames.
#[repr( u8 )]
#[derive( Clone, Copy, Debug, PartialEq, Eq )]
pub enum Division {
  Robot = 1,
  File = 2
}

impl Division {
  pub fn from_byte( byte: u8 ) -> Option<Division> {
    match byte {
      1 => Some( Division::Robot ),
      2 => Some( Division::File ),
      _ => None
    }
  }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - Request Body

/// The operation selector and request payload of a single command.
#[derive( Clone, Debug )]
pub struct RequestBody {
  pub command: u16,
  pub instance: u16,
  pub attribute: u8,
  pub service: u8,
  pub payload: Vec<u8>
}

/// Encodes a request frame into `out`.
pub fn encode_request( out: &mut Vec<u8>, division: Division, request_id: u8, block_number: u32, body: &RequestBody ) {
  out.reserve( HEADER_BYTES + body.payload.len() );
  out.extend_from_slice( &MAGIC );
  out.extend_from_slice( &( HEADER_BYTES as u16 ).to_le_bytes() );
  out.extend_from_slice( &( body.payload.len() as u16 ).to_le_bytes() );
  out.push( RESERVED_BYTE );
  out.push( division as u8 );
  out.push( 0 ); // ack: always zero in requests
  out.push( request_id );
  out.extend_from_slice( &block_number.to_le_bytes() );
  out.extend_from_slice( &[RESERVED_FILL; 8] );
  out.extend_from_slice( &body.command.to_le_bytes() );
  out.extend_from_slice( &body.instance.to_le_bytes() );
  out.push( body.attribute );
  out.push( body.service );
  out.extend_from_slice( &[0; 2] );
  out.extend_from_slice( &body.payload );
}

/// Encodes the empty acknowledgement frame sent after receiving one block of
/// a multi-block transfer.
pub fn encode_continuation_ack( division: Division, request_id: u8, block_number: u32 ) -> Vec<u8> {
  let mut out = Vec::with_capacity( HEADER_BYTES );
  out.extend_from_slice( &MAGIC );
  out.extend_from_slice( &( HEADER_BYTES as u16 ).to_le_bytes() );
  out.extend_from_slice( &0u16.to_le_bytes() );
  out.push( RESERVED_BYTE );
  out.push( division as u8 );
  out.push( 1 ); // ack
  out.push( request_id );
  out.extend_from_slice( &block_number.to_le_bytes() );
  out.extend_from_slice( &[RESERVED_FILL; 8] );
  out.extend_from_slice( &[0; 8] );
  out
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -  Response Header

/// A decoded response frame header.
#[derive( Clone, Copy, Debug )]
pub struct ResponseHeader {
  pub payload_size: u16,
  pub division: Division,
  pub request_id: u8,
  pub block_number: u32,
  pub service: u8,
  pub status: u8,
  pub extra_status: u16
}

/// Returns the request id of a datagram without decoding the full header.
/// Used to route received datagrams to their in-flight request.
pub fn peek_request_id( datagram: &[u8] ) -> Option<u8> {
  if datagram.len() < HEADER_BYTES || datagram[0..4] != MAGIC {
    return None;
  }
  Some( datagram[11] )
}

/// Decodes a response header, validating every frame invariant, and returns
/// it together with the payload bytes.
pub fn decode_response_header( datagram: &[u8] ) -> Result<( ResponseHeader, &[u8] )> {
  if datagram.len() < HEADER_BYTES {
    return Err( malformed( format!(
      "response ({} bytes) does not contain enough data for a header ({} bytes)",
      datagram.len(), HEADER_BYTES
    )));
  }

  if datagram[0..4] != MAGIC {
    return Err( malformed( "response does not start with magic bytes `YERC'".to_string() ) );
  }

  let header_size = u16::from_le_bytes([ datagram[4], datagram[5] ]);
  if header_size as usize != HEADER_BYTES {
    return Err( malformed( format!(
      "header size ({}) does not match the expected value ({})",
      header_size, HEADER_BYTES
    )));
  }

  let payload_size = u16::from_le_bytes([ datagram[6], datagram[7] ]);
  if payload_size as usize > MAX_PAYLOAD_BYTES {
    return Err( malformed( format!(
      "payload size ({}) exceeds the maximum size ({})",
      payload_size, MAX_PAYLOAD_BYTES
    )));
  }

  if datagram.len() != HEADER_BYTES + payload_size as usize {
    return Err( malformed( format!(
      "number of received bytes ({}) does not match the message size according to the header ({})",
      datagram.len(), HEADER_BYTES + payload_size as usize
    )));
  }

  let division = Division::from_byte( datagram[9] )
    .ok_or_else( ||{ malformed( format!( "unknown division ({}), expected 1 or 2", datagram[9] ) ) })?;

  let ack = datagram[10];
  if ack != 1 {
    return Err( malformed( format!( "response ACK value ({}) does not match the expected value (1)", ack ) ) );
  }

  let header = ResponseHeader{
    payload_size,
    division,
    request_id: datagram[11],
    block_number: u32::from_le_bytes( datagram[12..16].try_into().unwrap() ),
    // Bytes 16..24 are reserved filler.
    service: datagram[24],
    status: datagram[25],
    // Byte 26 is the added status size and byte 27 padding; the two-byte
    // extra status value that follows is taken as is.
    extra_status: u16::from_le_bytes([ datagram[28], datagram[29] ])
  };

  Ok(( header, &datagram[HEADER_BYTES..] ))
}

fn malformed( message: String ) -> Error {
  Error::MalformedResponse( message )
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -  Payload Reader

/// A bounds-checked little-endian cursor over a response payload.
pub struct PayloadReader<'a> {
  data: &'a [u8]
}

impl<'a> PayloadReader<'a> {
  pub fn new( data: &'a [u8] ) -> Self {
    Self{ data }
  }

  pub fn remaining( &self ) -> usize {
    self.data.len()
  }

  pub fn is_empty( &self ) -> bool {
    self.data.is_empty()
  }

  /// Fails with a malformed-response error unless the payload is exhausted.
  pub fn expect_empty( &self, what: &str ) -> Result<()> {
    if self.data.is_empty() {
      return Ok(());
    }
    Err( malformed( format!( "{} has {} unexpected trailing bytes", what, self.data.len() ) ) )
  }

  fn take( &mut self, count: usize, what: &str ) -> Result<&'a [u8]> {
    if self.data.len() < count {
      return Err( malformed( format!(
        "payload ends short of {}: expected {} more bytes, got {}",
        what, count, self.data.len()
      )));
    }
    let ( head, tail ) = self.data.split_at( count );
    self.data = tail;
    Ok( head )
  }

  pub fn skip( &mut self, count: usize ) -> Result<()> {
    self.take( count, "padding" )?;
    Ok(())
  }

  pub fn read_u8( &mut self ) -> Result<u8> {
    Ok( self.take( 1, "a u8 value" )?[0] )
  }

  pub fn read_u16( &mut self ) -> Result<u16> {
    Ok( u16::from_le_bytes( self.take( 2, "a u16 value" )?.try_into().unwrap() ) )
  }

  pub fn read_i16( &mut self ) -> Result<i16> {
    Ok( i16::from_le_bytes( self.take( 2, "an i16 value" )?.try_into().unwrap() ) )
  }

  pub fn read_u32( &mut self ) -> Result<u32> {
    Ok( u32::from_le_bytes( self.take( 4, "a u32 value" )?.try_into().unwrap() ) )
  }

  pub fn read_i32( &mut self ) -> Result<i32> {
    Ok( i32::from_le_bytes( self.take( 4, "an i32 value" )?.try_into().unwrap() ) )
  }

  /// Reads an IEEE 754 value stored as the bit pattern of a little-endian u32.
  pub fn read_f32( &mut self ) -> Result<f32> {
    Ok( f32::from_bits( self.read_u32()? ) )
  }

  pub fn read_bytes( &mut self, count: usize ) -> Result<&'a [u8]> {
    self.take( count, "raw bytes" )
  }

  /// Reads a fixed-width string field, trimming trailing NUL padding.
  pub fn read_string( &mut self, count: usize ) -> Result<String> {
    let bytes = self.take( count, "a string value" )?;
    let end = bytes.iter().position( | &byte |{ byte == 0 }).unwrap_or( bytes.len() );
    Ok( String::from_utf8_lossy( &bytes[..end] ).into_owned() )
  }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -  Tests
