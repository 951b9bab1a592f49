//! Controller status as reported by the read-status command.
use crate::error::Result;
use crate::frame::PayloadReader;

/// The wire size of a status response: two little-endian 32-bit data words.
pub const STATUS_BYTES: usize = 8;

/// The controller status, received as two 32-bit words of flag bits.
#[derive( Clone, Copy, Debug, Default, PartialEq, Eq )]
pub struct Status {
  data1: u32,
  data2: u32
}

impl Status {
  pub fn from_words( data1: u32, data2: u32 ) -> Self {
    Self{ data1, data2 }
  }

  pub fn decode( reader: &mut PayloadReader ) -> Result<Status> {
    Ok( Status{
      data1: reader.read_u32()?,
      data2: reader.read_u32()?
    })
  }

  // Data word 1 bits:
  //  [0]: step cycle selected
  //  [1]: one-cycle selected
  //  [2]: continuous cycle selected
  //  [3]: a job is running
  //  [4]: speed limited operation
  //  [5]: teach mode
  //  [6]: play mode
  //  [7]: command remote mode

  pub fn step( self ) -> bool {
    self.data1 & 0x01 != 0
  }

  pub fn one_cycle( self ) -> bool {
    self.data1 & 0x02 != 0
  }

  pub fn continuous( self ) -> bool {
    self.data1 & 0x04 != 0
  }

  pub fn running( self ) -> bool {
    self.data1 & 0x08 != 0
  }

  pub fn speed_limited( self ) -> bool {
    self.data1 & 0x10 != 0
  }

  pub fn teach( self ) -> bool {
    self.data1 & 0x20 != 0
  }

  pub fn play( self ) -> bool {
    self.data1 & 0x40 != 0
  }

  pub fn remote( self ) -> bool {
    self.data1 & 0x80 != 0
  }

  // Data word 2 bits:
  //  [1]: hold from the teach pendant
  //  [2]: hold from an external input
  //  [3]: hold from a command
  //  [4]: an alarm is active
  //  [5]: an error is active
  //  [6]: servo power is on

  pub fn pendant_hold( self ) -> bool {
    self.data2 & 0x02 != 0
  }

  pub fn external_hold( self ) -> bool {
    self.data2 & 0x04 != 0
  }

  pub fn command_hold( self ) -> bool {
    self.data2 & 0x08 != 0
  }

  pub fn alarm( self ) -> bool {
    self.data2 & 0x10 != 0
  }

  pub fn error( self ) -> bool {
    self.data2 & 0x20 != 0
  }

  pub fn servo_on( self ) -> bool {
    self.data2 & 0x40 != 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_words_decode_into_flag_accessors() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice( &0x48u32.to_le_bytes() ); // running + play
    bytes.extend_from_slice( &0x50u32.to_le_bytes() ); // alarm + servo on

    let mut reader = PayloadReader::new( &bytes );
    let status = Status::decode( &mut reader ).unwrap();

    assert!( status.running() );
    assert!( status.play() );
    assert!( !status.teach() );
    assert!( status.alarm() );
    assert!( status.servo_on() );
    assert!( !status.error() );
  }
}
